use clap::{Parser, Subcommand};
use medcheck_core::{
    config::{crm_from_env_value, resolve_reference_table},
    money::format_brl,
    AuditReport, AuditService, BilledProcedure, ComparisonOptions, CoreConfig, Guide,
    MissingReference, ReconciliationReport, RoleMatching, Signatory, Statement,
};
use medcheck_core::{GroupKey, ReferenceLookup};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "medcheck")]
#[command(about = "Audit medical procedure payments against the CBHPM reference table")]
struct Cli {
    /// Reference table JSON (defaults to MEDCHECK_REFERENCE_TABLE, then the bundled table)
    #[arg(long, global = true)]
    reference_table: Option<PathBuf>,
    /// Only accept known role names and keep second assistants separate
    #[arg(long, global = true)]
    strict_roles: bool,
    /// Report paid lines without reference data as unclassified instead of above
    #[arg(long, global = true)]
    unclassified_missing: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a reference value
    Lookup {
        /// CBHPM procedure code
        code: String,
        /// Role as printed on the guide
        #[arg(long, default_value = "")]
        role: String,
    },
    /// Compare billed procedures against the reference table
    Compare {
        /// JSON array of billed procedures
        procedures: PathBuf,
        /// Group the summary by role, hospital or period
        #[arg(long)]
        group_by: Option<GroupKey>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pair guides with payer statements, then compare
    Reconcile {
        /// JSON array of extracted guides
        guides: PathBuf,
        /// JSON array of payer statements
        statements: PathBuf,
        /// Only audit guides listing this physician (defaults to MEDCHECK_CRM)
        #[arg(long)]
        crm: Option<String>,
        #[arg(long)]
        group_by: Option<GroupKey>,
        #[arg(long)]
        json: bool,
    },
    /// Draft contestation letters for underpaid or unpaid procedures
    Contest {
        /// JSON array of billed procedures
        procedures: PathBuf,
        /// Denial reason stated by the payer
        #[arg(long)]
        reason: Option<String>,
        /// Signing physician's name
        #[arg(long, default_value = "")]
        doctor_name: String,
        /// Signing physician's CRM
        #[arg(long, default_value = "")]
        doctor_crm: String,
    },
}

fn build_config(cli: &Cli) -> Result<CoreConfig, Box<dyn std::error::Error>> {
    let table_path = cli
        .reference_table
        .clone()
        .or_else(|| std::env::var_os("MEDCHECK_REFERENCE_TABLE").map(PathBuf::from));
    let table = resolve_reference_table(table_path)?;
    let options = ComparisonOptions {
        role_matching: if cli.strict_roles {
            RoleMatching::Strict
        } else {
            RoleMatching::Lenient
        },
        missing_reference: if cli.unclassified_missing {
            MissingReference::Unclassified
        } else {
            MissingReference::TreatAsZero
        },
    };
    let crm = crm_from_env_value(std::env::var("MEDCHECK_CRM").ok())?;
    Ok(CoreConfig::new(Arc::new(table), options, crm)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&contents)
        .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;
    Ok(value)
}

fn render_report(report: &AuditReport) -> String {
    let mut out = String::new();
    for r in &report.results {
        out.push_str(&format!(
            "{:<10} {:<20} ref {:>12} pago {:>12} dif {:>12}  {}\n",
            r.code,
            r.role,
            format_brl(r.reference_value),
            format_brl(r.paid_amount),
            format_brl(r.difference),
            r.status.label()
        ));
    }

    let s = &report.summary;
    out.push_str(&format!(
        "\nTotal: {} | conforme: {} | abaixo: {} | acima: {} | não pago: {} | sem referência: {}\n",
        s.total, s.matches, s.below, s.above, s.not_paid, s.unclassified
    ));
    out.push_str(&format!(
        "Referência: {} | Pago: {} | Diferença: {} | A recuperar: {}\n",
        format_brl(s.total_reference),
        format_brl(s.total_paid),
        format_brl(s.total_difference),
        format_brl(s.total_shortfall)
    ));

    for group in &report.groups {
        out.push_str(&format!(
            "  {}: {} itens, {} abaixo, {} não pagos, pago {} de {}\n",
            group.key,
            group.summary.total,
            group.summary.below,
            group.summary.not_paid,
            format_brl(group.summary.total_paid),
            format_brl(group.summary.total_reference)
        ));
    }

    if !report.top_procedures.is_empty() {
        out.push_str("\nProcedimentos mais frequentes:\n");
        for tally in &report.top_procedures {
            out.push_str(&format!(
                "  {} x{} {}\n",
                tally.code, tally.count, tally.description
            ));
        }
    }
    out
}

fn render_reconciliation(report: &ReconciliationReport) -> String {
    let mut out = render_report(&report.audit);
    if report.duplicate_guides > 0 {
        out.push_str(&format!("\nGuias duplicadas ignoradas: {}\n", report.duplicate_guides));
    }
    if !report.rejected_guides.is_empty() {
        out.push_str(&format!(
            "Guias sem o médico informado: {}\n",
            report.rejected_guides.join(", ")
        ));
    }
    for line in &report.unmatched_lines {
        out.push_str(&format!(
            "Linha sem guia correspondente: guia {} código {} valor {}\n",
            line.guide_number,
            line.code,
            format_brl(line.paid_amount)
        ));
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medcheck_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command.as_ref() else {
        println!("Use 'medcheck --help' for commands");
        return Ok(());
    };

    let service = AuditService::new(Arc::new(build_config(&cli)?));

    match command {
        Commands::Lookup { code, role } => match service.procedure(code) {
            None => eprintln!("Procedure {} not found in reference table", code.trim()),
            Some(procedure) => {
                println!("{} - {}", procedure.code, procedure.description);
                for (r, value) in &procedure.value_by_role {
                    println!("  {:<18} {}", r.label(), format_brl(*value));
                }
                if !role.is_empty() {
                    match service.lookup(code, role) {
                        ReferenceLookup::Found(value) => {
                            println!("Valor para '{}': {}", role, format_brl(value))
                        }
                        ReferenceLookup::NotFound => {
                            println!("Sem valor de referência para '{}'", role)
                        }
                    }
                }
            }
        },
        Commands::Compare {
            procedures,
            group_by,
            json,
        } => {
            let procedures: Vec<BilledProcedure> = read_json(procedures)?;
            let report = service.audit(&procedures, *group_by);
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }
        }
        Commands::Reconcile {
            guides,
            statements,
            crm,
            group_by,
            json,
        } => {
            let guides: Vec<Guide> = read_json(guides)?;
            let statements: Vec<Statement> = read_json(statements)?;
            let report = match crm_from_env_value(crm.clone())? {
                Some(crm) => service.reconcile_for(guides, &statements, Some(&crm), *group_by),
                None => service.reconcile(guides, &statements, *group_by),
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_reconciliation(&report));
            }
        }
        Commands::Contest {
            procedures,
            reason,
            doctor_name,
            doctor_crm,
        } => {
            let procedures: Vec<BilledProcedure> = read_json(procedures)?;
            let today = chrono::Local::now().date_naive();
            let signatory = Signatory {
                name: doctor_name.clone(),
                crm: doctor_crm.clone(),
            };
            let mut letters = 0;
            for procedure in &procedures {
                let outcome = service.contest(procedure, reason.as_deref(), today, Some(&signatory));
                if let Some(contestation) = outcome.contestation {
                    letters += 1;
                    println!("{}", contestation.text);
                }
            }
            eprintln!("{} of {} procedures contested", letters, procedures.len());
        }
    }

    Ok(())
}
