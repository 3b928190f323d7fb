//! treasury-runner: command runner for the tuition core.
//!
//! Usage:
//!   treasury-runner --db treasury.db --data-dir ./data --seed
//!   treasury-runner --db treasury.db --ipc-mode < commands.jsonl

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};
use tuition_core::{
    config::TreasuryConfig,
    error::TuitionResult,
    special_case::SpecialCaseRequest,
    store::{NewEnrollment, NewPayment, TuitionStore},
    treasury::{Treasury, YearTariffEntry},
    types::{EnrollmentId, PaymentId, StudentId, Year},
};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Enroll(NewEnrollment),
    DebtReport {
        enrollment_id: EnrollmentId,
    },
    VerifyDebts {
        student_id: StudentId,
        year:       Year,
    },
    Tariff {
        year:   Year,
        course: String,
        branch: String,
    },
    RegisterSpecialCase(SpecialCaseRequest),
    ClearSpecialCase {
        enrollment_id: EnrollmentId,
    },
    CreateCustomTariff {
        enrollment_id: EnrollmentId,
        matriculation: Decimal,
        monthly:       Decimal,
    },
    UpdateCustomTariff {
        id:            i64,
        matriculation: Decimal,
        monthly:       Decimal,
    },
    DeleteCustomTariff {
        id: i64,
    },
    RecordPayment {
        #[serde(flatten)]
        payment: NewPayment,
        at:      Option<NaiveDateTime>,
    },
    DeletePayment {
        id: PaymentId,
        at: Option<NaiveDateTime>,
    },
    Payments {
        enrollment_id: EnrollmentId,
    },
    PaymentProgress {
        year:   Year,
        branch: String,
    },
    PaymentSummary {
        year:   Year,
        branch: String,
        course: Option<String>,
    },
    Statement {
        enrollment_id: EnrollmentId,
    },
    RegisterYearTariffs {
        year:    Year,
        tariffs: Vec<YearTariffEntry>,
    },
    TariffsDefined {
        year: Year,
    },
    TariffHistory,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let year = parse_arg(&args, "--year", Local::now().year());
    let seed = args.iter().any(|a| a == "--seed");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    if !ipc_mode {
        println!("treasury-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  year:      {year}");
        println!();
    }

    let config = TreasuryConfig::load(data_dir)?;
    let store = TuitionStore::open(db)?;
    store.migrate()?;
    if seed {
        store.seed_reference(&config)?;
    }
    let treasury = Treasury::new(store, config.policy);

    if ipc_mode {
        run_ipc_loop(&treasury)?;
    } else {
        print_summary(&treasury, year)?;
    }
    Ok(())
}

fn run_ipc_loop(treasury: &Treasury) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", json!({ "error": e.to_string(), "status": 400 }))?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(treasury, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("ipc: {e}");
                json!({ "error": e.to_string(), "status": e.status_code() })
            }
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn handle_command(treasury: &Treasury, cmd: IpcCommand) -> TuitionResult<Value> {
    let reply = match cmd {
        IpcCommand::Enroll(enrollment) => {
            let id = treasury.enroll(&enrollment)?;
            json!({ "ok": true, "inscripcion_id": id })
        }
        IpcCommand::DebtReport { enrollment_id } => {
            serde_json::to_value(treasury.debt_report(enrollment_id)?)?
        }
        IpcCommand::VerifyDebts { student_id, year } => {
            serde_json::to_value(treasury.verify_debts(student_id, year)?)?
        }
        IpcCommand::Tariff { year, course, branch } => {
            serde_json::to_value(treasury.tariff_for(year, &course, &branch)?)?
        }
        IpcCommand::RegisterSpecialCase(request) => {
            let case = treasury.register_special_case(request)?;
            json!({ "ok": true, "inscripcion_id": case.enrollment_id, "mensualidades": case.amounts.len() })
        }
        IpcCommand::ClearSpecialCase { enrollment_id } => {
            treasury.clear_special_case(enrollment_id)?;
            json!({ "ok": true })
        }
        IpcCommand::CreateCustomTariff { enrollment_id, matriculation, monthly } => {
            let id = treasury.create_custom_tariff(enrollment_id, matriculation, monthly)?;
            json!({ "ok": true, "id": id })
        }
        IpcCommand::UpdateCustomTariff { id, matriculation, monthly } => {
            treasury.update_custom_tariff(id, matriculation, monthly)?;
            json!({ "ok": true })
        }
        IpcCommand::DeleteCustomTariff { id } => {
            treasury.delete_custom_tariff(id)?;
            json!({ "ok": true })
        }
        IpcCommand::RecordPayment { payment, at } => {
            serde_json::to_value(treasury.record_payment(&payment, at.unwrap_or_else(now))?)?
        }
        IpcCommand::DeletePayment { id, at } => {
            treasury.delete_payment(id, at.unwrap_or_else(now))?;
            json!({ "ok": true })
        }
        IpcCommand::Payments { enrollment_id } => {
            serde_json::to_value(treasury.payments(enrollment_id)?)?
        }
        IpcCommand::PaymentSummary { year, branch, course } => {
            // "Ninguno" is the listing screen's "no course filter".
            let course = course.as_deref().filter(|c| *c != "Ninguno");
            serde_json::to_value(treasury.payment_summary(year, &branch, course)?)?
        }
        IpcCommand::PaymentProgress { year, branch } => {
            serde_json::to_value(treasury.payment_progress(year, &branch)?)?
        }
        IpcCommand::Statement { enrollment_id } => {
            serde_json::to_value(treasury.statement(enrollment_id)?)?
        }
        IpcCommand::RegisterYearTariffs { year, tariffs } => {
            treasury.register_year_tariffs(year, &tariffs)?;
            json!({ "ok": true, "year": year })
        }
        IpcCommand::TariffsDefined { year } => {
            json!({ "year": year, "defined": treasury.tariffs_defined(year)? })
        }
        IpcCommand::TariffHistory => serde_json::to_value(treasury.tariff_history()?)?,
        IpcCommand::Quit => Value::Null,
    };
    Ok(reply)
}

fn print_summary(treasury: &Treasury, year: Year) -> Result<()> {
    let store = treasury.store();
    let groups = store.fee_groups()?;
    let courses = store.course_mappings()?;

    println!("=== REFERENCE DATA ===");
    println!("  fee groups:     {}", groups.len());
    println!("  course mappings: {}", courses.len());
    println!("  {year} defined:   {}", treasury.tariffs_defined(year)?);

    println!();
    println!("=== TARIFF HISTORY ===");
    let history = treasury.tariff_history()?;
    if history.is_empty() {
        println!("  (No tariffs defined yet)");
    } else {
        for t in &history {
            println!(
                "  {} | {:<20} | Matrícula: {} | Mensualidad: {}",
                t.year, t.group_name, t.matriculation, t.monthly
            );
        }
    }

    println!();
    println!("=== PREVIOUS YEAR ===");
    for t in treasury.previous_year_tariffs(year)? {
        println!("  group {} | {} / {}", t.fee_group_id, t.matriculation, t.monthly);
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
