use clap::{Parser, Subcommand};
use clinic_core::constants::DEFAULT_DATA_DIR;
use clinic_core::store::{FileStore, RecordStore};
use clinic_core::{
    AppointmentService, InvoiceService, Money, NewAppointment, NewInvoice, PatientFields,
    PatientService,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic practice-management CLI")]
struct Cli {
    /// Record store directory
    #[arg(long, env = "CLINIC_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    List,
    /// Register a patient
    AddPatient {
        /// Full name
        name: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// List all appointments
    Appointments,
    /// Book an appointment
    Book {
        /// Patient identifier
        patient_id: String,
        /// Start time, e.g. 2026-05-01T09:00
        start: String,
        #[arg(long, default_value = "")]
        end: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List all invoices
    Invoices,
    /// Bill an appointment
    Bill {
        /// Appointment identifier
        appointment_id: String,
        quantity: i64,
        /// Unit price, e.g. 25.00
        unit_price: Money,
        #[arg(long, default_value = "")]
        description: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'clinic --help' for commands");
        return Ok(());
    };

    let store: Arc<dyn RecordStore> = Arc::new(FileStore::new(&cli.data_dir)?);

    match command {
        Commands::List => {
            let patients = PatientService::new(store).list()?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    println!(
                        "ID: {}, Name: {}, Phone: {}, Balance: {}, Created: {}",
                        patient.id,
                        patient.name,
                        patient.phone,
                        patient.billing_balance,
                        patient.created_at
                    );
                }
            }
        }
        Commands::AddPatient {
            name,
            address,
            phone,
            email,
        } => {
            let fields = PatientFields {
                name,
                address,
                phone,
                email,
            };
            match PatientService::new(store).create(fields) {
                Ok(id) => println!("Registered patient with ID: {}", id),
                Err(e) => eprintln!("Error registering patient: {}", e),
            }
        }
        Commands::Appointments => {
            let appointments = AppointmentService::new(store).list()?;
            if appointments.is_empty() {
                println!("No appointments found.");
            }
            for row in appointments {
                println!(
                    "ID: {}, Patient: {}, Start: {}, End: {}, Status: {}",
                    row.appointment.id,
                    row.patient_name,
                    row.appointment.start,
                    row.appointment.end,
                    row.appointment.status
                );
            }
        }
        Commands::Book {
            patient_id,
            start,
            end,
            notes,
        } => {
            let booking = NewAppointment {
                patient_id,
                start,
                end,
                notes,
            };
            match AppointmentService::new(store).create(booking) {
                Ok(id) => println!("Booked appointment with ID: {}", id),
                Err(e) => eprintln!("Error booking appointment: {}", e),
            }
        }
        Commands::Invoices => {
            let invoices = InvoiceService::new(store).list()?;
            if invoices.is_empty() {
                println!("No invoices found.");
            }
            for invoice in invoices {
                println!(
                    "ID: {}, Appointment: {}, Total: {}, Status: {}, Created: {}",
                    invoice.id,
                    invoice.appointment_id,
                    invoice.total,
                    invoice.status,
                    invoice.created_at
                );
            }
        }
        Commands::Bill {
            appointment_id,
            quantity,
            unit_price,
            description,
        } => {
            let input = NewInvoice {
                appointment_id,
                description,
                quantity,
                unit_price,
            };
            match InvoiceService::new(store).create(input) {
                Ok(id) => println!("Created invoice with ID: {}", id),
                Err(e) => eprintln!("Error creating invoice: {}", e),
            }
        }
    }

    Ok(())
}
