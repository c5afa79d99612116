/// Command-line interface for the queue scheduling system.
///
/// This module provides an interactive CLI for registering doctors,
/// submitting patient arrivals, advancing queues and viewing wait estimates.

use chrono::{Duration, Timelike, Utc};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use mediqueue::logging::{parse_log_level, setup_logging, LoggingConfig};
use mediqueue::{
    ArrivalEvent, DoctorId, PatientId, QueueManagementSystem, SchedulerConfig, SourceChannel,
    SystemClock, TerminalOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "mediqueue", about = "Priority-based patient queue scheduler")]
struct Args {
    /// TOML file with doctors and defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Include source file and line in log lines
    #[arg(long)]
    log_file_info: bool,

    /// Run the demo and exit
    #[arg(long)]
    demo: bool,
}

struct QueueCLI {
    system: QueueManagementSystem,
    average_consult_minutes: u32,
    running: bool,
}

impl QueueCLI {
    fn new(system: QueueManagementSystem, average_consult_minutes: u32) -> Self {
        QueueCLI {
            system,
            average_consult_minutes,
            running: true,
        }
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       PATIENT QUEUE MANAGEMENT SYSTEM");
        println!("{}", "=".repeat(60));
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!("1. Register doctor");
        println!("2. Submit patient arrival");
        println!("3. Call next patient");
        println!("4. Record outcome (consulted / no-show)");
        println!("5. Estimate wait time");
        println!("6. View queue");
        println!("7. Reassign patient");
        println!("8. Run demo");
        println!("9. Exit");
        println!("{}", "-".repeat(20));
    }

    fn get_input(&self, prompt: &str, default: Option<&str>) -> String {
        if let Some(def) = default {
            print!("{} [{}]: ", prompt, def);
        } else {
            print!("{}: ", prompt);
        }
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return default.unwrap_or("").to_string();
        }
        let input = input.trim();

        if input.is_empty() {
            default.unwrap_or("").to_string()
        } else {
            input.to_string()
        }
    }

    fn get_int_input(&self, prompt: &str, default: Option<i64>) -> i64 {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref());

            if let Ok(value) = input.parse::<i64>() {
                return value;
            }
            println!("Please enter a valid number");
        }
    }

    fn get_doctor(&self) -> DoctorId {
        let ids = self.system.doctor_ids();
        let default = ids.first().map(|d| d.to_string());
        DoctorId::from(self.get_input("Doctor ID", default.as_deref()).as_str())
    }

    fn register_doctor(&mut self) {
        println!("\n--- Register Doctor ---");

        let doctor_id = self.get_input("Doctor ID", Some("D1"));
        let raw = self.get_input("Availability windows (e.g. 9-12,15-18)", Some("9-12,15-18"));

        let mut windows = Vec::new();
        for part in raw.split(',') {
            let bounds: Vec<&str> = part.trim().split('-').collect();
            match (bounds.first(), bounds.get(1)) {
                (Some(start), Some(end)) => match (start.parse::<u32>(), end.parse::<u32>()) {
                    (Ok(start), Ok(end)) => windows.push((start, end)),
                    _ => {
                        println!("Invalid window: {}", part);
                        return;
                    }
                },
                _ => {
                    println!("Invalid window: {}", part);
                    return;
                }
            }
        }

        let doctor_id = match DoctorId::new(doctor_id) {
            Ok(id) => id,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        match self.system.register_doctor(doctor_id.clone(), &windows) {
            Ok(()) => println!("\nRegistered {} with {} window(s)", doctor_id, windows.len()),
            Err(e) => println!("Error registering doctor: {}", e),
        }
    }

    fn submit_arrival(&mut self) {
        println!("\n--- Submit Patient Arrival ---");

        let doctor_id = self.get_doctor();
        let generated = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let patient_id = self.get_input("Patient ID", Some(generated.as_str()));

        println!("\nSources: ivr, app, whatsapp, walk-in");
        let source = match SourceChannel::from_string(&self.get_input("Source", Some("walk-in"))) {
            Ok(source) => source,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        let urgency = self.get_int_input("Urgency (1-5)", Some(3));

        let now = Utc::now();
        let scheduled_time = if source.is_pre_booked() {
            let offset = self.get_int_input("Scheduled time relative to now (minutes, negative = late)", Some(0));
            Some(now + Duration::minutes(offset))
        } else {
            None
        };

        let event = ArrivalEvent {
            doctor_id,
            patient_id,
            arrival_time: now,
            scheduled_time,
            urgency: u8::try_from(urgency).unwrap_or(0),
            source,
        };

        match self.system.submit_arrival(event) {
            Ok(assignment) => {
                println!("\nPatient {} queued for {}", assignment.patient_id, assignment.doctor_id);
                println!("Priority score: {}", assignment.priority_score);
                println!("Position in queue: {}", assignment.position + 1);
            }
            Err(e) => println!("Error submitting arrival: {}", e),
        }
    }

    fn call_next(&mut self) {
        let doctor_id = self.get_doctor();
        match self.system.next_for_doctor(&doctor_id) {
            Ok(Some(patient)) => println!(
                "\nNow seeing {} (urgency {}, {})",
                patient.patient_id,
                patient.urgency.value(),
                patient.source.name()
            ),
            Ok(None) => println!("\nNo patients waiting for {}", doctor_id),
            Err(e) => println!("Error: {}", e),
        }
    }

    fn record_outcome(&mut self) {
        println!("\n--- Record Outcome ---");
        let patient_id = PatientId::from(self.get_input("Patient ID", None).as_str());
        let outcome = match self.get_input("Outcome (consulted/no-show)", Some("consulted")).as_str() {
            "no-show" | "noshow" => TerminalOutcome::NoShow,
            _ => TerminalOutcome::Consulted,
        };

        match self.system.set_terminal_status(&patient_id, outcome) {
            Ok(()) => println!("\n{} marked {}", patient_id, outcome.status()),
            Err(e) => println!("Error: {}", e),
        }
    }

    fn estimate_wait(&self) {
        let doctor_id = self.get_doctor();
        match self.system.estimate_wait_time(&doctor_id, self.average_consult_minutes) {
            Ok(minutes) => println!(
                "\nEstimated wait time for {}: {} minutes",
                doctor_id, minutes
            ),
            Err(e) => println!("Error: {}", e),
        }
        if let Ok(minutes) = self.system.estimate_wait_from_history(&doctor_id) {
            println!("Based on observed consultations: {} minutes", minutes);
        }
    }

    fn view_queue(&self) {
        let doctor_id = self.get_doctor();
        let snapshot = match self.system.query_snapshot(&doctor_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };

        let hour = Utc::now().hour();
        let available = self.system.is_doctor_available(&doctor_id, hour).unwrap_or(false);
        println!(
            "\n--- Queue for {} ({} waiting, {}) ---",
            doctor_id,
            snapshot.len(),
            if available { "on duty" } else { "off duty" }
        );

        if snapshot.is_empty() {
            println!("  (empty)");
            return;
        }
        for (i, entry) in snapshot.iter().enumerate() {
            println!(
                "  {:2}. {:12} score {:5}  {}",
                i + 1,
                entry.patient_id,
                entry.priority_score,
                entry.status
            );
        }
    }

    fn reassign(&mut self) {
        println!("\n--- Reassign Patient ---");
        let patient_id = PatientId::from(self.get_input("Patient ID", None).as_str());
        let from = match self.system.doctor_of(&patient_id) {
            Ok(doctor_id) => doctor_id,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        let to = DoctorId::from(self.get_input("New doctor ID", None).as_str());

        match self.system.reassign_patient(&patient_id, &from, &to) {
            Ok(assignment) => println!(
                "\n{} moved from {} to {} (score {}, position {})",
                patient_id,
                from,
                to,
                assignment.priority_score,
                assignment.position + 1
            ),
            Err(e) => println!("Error: {}", e),
        }
    }

    fn run_demo(&mut self) {
        println!("\n--- Running Demo ---");

        let system = QueueManagementSystem::new(Arc::new(SystemClock));
        let doctor = DoctorId::from("1");
        if let Err(e) = run_demo_scenario(&system, &doctor, self.average_consult_minutes) {
            println!("Demo failed: {}", e);
            return;
        }
        self.system = system;
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.print_menu();

            let choice = self.get_int_input("Enter choice", Some(8));

            match choice {
                1 => self.register_doctor(),
                2 => self.submit_arrival(),
                3 => self.call_next(),
                4 => self.record_outcome(),
                5 => self.estimate_wait(),
                6 => self.view_queue(),
                7 => self.reassign(),
                8 => self.run_demo(),
                9 => {
                    self.running = false;
                    println!("\nGoodbye!");
                }
                _ => println!("Invalid choice"),
            }
        }
    }
}

/// Two patients booked ahead, then a late urgent WhatsApp booking.
fn run_demo_scenario(
    system: &QueueManagementSystem,
    doctor: &DoctorId,
    average_consult_minutes: u32,
) -> mediqueue::Result<()> {
    system.register_doctor(doctor.clone(), &[(9, 12), (15, 18)])?;
    let now = Utc::now();

    let arrivals = [
        ("101", Some(now + Duration::minutes(15)), 2, SourceChannel::App),
        ("102", Some(now + Duration::minutes(10)), 3, SourceChannel::WalkIn),
    ];
    for (patient_id, scheduled_time, urgency, source) in arrivals {
        let assignment = system.submit_arrival(ArrivalEvent {
            doctor_id: doctor.clone(),
            patient_id: patient_id.to_string(),
            arrival_time: now,
            scheduled_time,
            urgency,
            source,
        })?;
        println!(
            "  Patient {} ({}) score {}",
            assignment.patient_id,
            source.name(),
            assignment.priority_score
        );
    }

    let wait = system.estimate_wait_time(doctor, average_consult_minutes)?;
    println!("\nEstimated wait time for Doctor {}: {} minutes", doctor, wait);

    let late = system.submit_arrival(ArrivalEvent {
        doctor_id: doctor.clone(),
        patient_id: "103".to_string(),
        arrival_time: now,
        scheduled_time: Some(now - Duration::minutes(5)),
        urgency: 5,
        source: SourceChannel::WhatsApp,
    })?;
    println!(
        "  Patient {} (WhatsApp, 5 min late) score {}",
        late.patient_id, late.priority_score
    );

    let wait = system.estimate_wait_time(doctor, average_consult_minutes)?;
    println!(
        "\nUpdated estimated wait time for Doctor {} after new patient: {} minutes",
        doctor, wait
    );

    println!("\nQueue order:");
    for entry in system.query_snapshot(doctor)? {
        println!("  {:4} score {}", entry.patient_id, entry.priority_score);
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match SchedulerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => SchedulerConfig::default(),
    };

    let level_name = args.log_level.as_deref().unwrap_or(&config.log_level);
    let level = match parse_log_level(level_name) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let mut logging = LoggingConfig::new(level);
    if args.log_file_info {
        logging = logging.with_file_info();
    }
    if let Err(e) = setup_logging(&logging) {
        eprintln!("{}", e);
    }

    let system = match config.build_system(Arc::new(SystemClock)) {
        Ok(system) => system,
        Err(e) => {
            error!(error = %e, "Failed to build scheduler");
            std::process::exit(1);
        }
    };

    let mut cli = QueueCLI::new(system, config.average_consult_minutes);
    if args.demo {
        cli.run_demo();
        return;
    }
    cli.run();
}
