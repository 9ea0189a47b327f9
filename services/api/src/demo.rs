use crate::infra::{InMemoryLeadRepository, LogNotifier};
use clap::Args;
use realty_crm::config::PipelineConfig;
use realty_crm::error::AppError;
use realty_crm::workflows::pipeline::{
    LeadCsvImporter, LeadId, LeadPipelineService, LeadSource, LeadSubmission, PipelineView,
    StageId, StageMutationService,
};
use std::path::PathBuf;
use std::sync::Arc;

type DemoPipeline = StageMutationService<InMemoryLeadRepository, LogNotifier>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Stage the first sample lead is dragged to (defaults to `proposal`).
    #[arg(long)]
    pub(crate) target_stage: Option<String>,
    /// Print every lead under its column instead of counts only.
    #[arg(long)]
    pub(crate) list_leads: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export with Name, Email, Phone, Property, Message, Stage, Source headers.
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Print every lead under its column instead of counts only.
    #[arg(long)]
    pub(crate) list_leads: bool,
    /// Emit the import summary as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        target_stage,
        list_leads,
    } = args;
    let target = StageId::new(target_stage.unwrap_or_else(|| "proposal".to_string()));

    println!("Lead pipeline demo");
    let service = demo_pipeline()?;
    let pipeline = service.pipeline();

    let mut first = None;
    for submission in sample_submissions() {
        match pipeline.create_lead(submission) {
            Ok(lead) => {
                println!(
                    "- Received lead {} ({}) via {} -> {}",
                    lead.id,
                    lead.full_name,
                    lead.source.label(),
                    lead.stage_id
                );
                if first.is_none() {
                    first = Some(lead.id);
                }
            }
            Err(err) => println!("  Submission rejected: {}", err),
        }
    }

    let before = pipeline.grouped_view()?;
    render_board("\nBoard before move", &before, list_leads);

    let Some(lead_id) = first else {
        return Ok(());
    };
    drag_lead(&service, lead_id, target);

    let after = pipeline.grouped_view()?;
    render_board("\nBoard after move", &after, list_leads);
    Ok(())
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let ImportArgs {
        csv,
        list_leads,
        json,
    } = args;

    let submissions = LeadCsvImporter::from_path(&csv)?;
    let service = demo_pipeline()?;
    let summary = service.pipeline().import_leads(submissions)?;

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{}", payload),
            Err(err) => println!("Import summary unavailable: {}", err),
        }
        return Ok(());
    }

    println!("Lead import from {}", csv.display());
    println!(
        "- {} created | {} rejected",
        summary.created.len(),
        summary.rejected.len()
    );
    for rejection in &summary.rejected {
        match rejection.field {
            Some(field) => println!(
                "  - row {} [{}]: {}",
                rejection.row, field, rejection.error
            ),
            None => println!("  - row {}: {}", rejection.row, rejection.error),
        }
    }

    let board = service.pipeline().grouped_view()?;
    render_board("\nBoard", &board, list_leads);
    Ok(())
}

fn demo_pipeline() -> Result<DemoPipeline, AppError> {
    let pipeline = LeadPipelineService::from_config(
        Arc::new(InMemoryLeadRepository::default()),
        Arc::new(LogNotifier),
        &PipelineConfig::default(),
    )?;
    Ok(StageMutationService::new(Arc::new(pipeline)))
}

fn drag_lead(service: &DemoPipeline, lead_id: LeadId, target: StageId) {
    let pending = match service.begin_move(lead_id, target) {
        Ok(pending) => pending,
        Err(err) => {
            println!("\nMove refused: {}", err);
            return;
        }
    };
    println!(
        "\nDragging lead {} from {} to {}",
        pending.lead_id(),
        pending.origin(),
        pending.target()
    );

    match service.commit(pending) {
        Ok(lead) => println!("- Committed: lead {} now in {}", lead.id, lead.stage_id),
        Err(err) => println!("- Rolled back: {}", err),
    }
}

fn render_board(title: &str, view: &PipelineView, list_leads: bool) {
    println!("{} ({} leads)", title, view.total);
    for column in &view.stages {
        println!("- {}: {}", column.name, column.count);
        if list_leads {
            for lead in &column.leads {
                println!("    - #{} {} <{}>", lead.id, lead.full_name, lead.email);
            }
        }
    }
    if !view.unassigned.is_empty() {
        println!("- Unassigned: {}", view.unassigned.len());
    }
}

fn sample_submissions() -> Vec<LeadSubmission> {
    vec![
        LeadSubmission {
            full_name: "Ana Souza".to_string(),
            email: "ana.souza@example.com".to_string(),
            phone: Some("+55 11 91234-5678".to_string()),
            property_id: Some("APT-1203".to_string()),
            message: Some("Is the unit still available?".to_string()),
            stage: None,
            source: LeadSource::Website,
        },
        LeadSubmission {
            full_name: "Bruno Lima".to_string(),
            email: "bruno.lima@example.com".to_string(),
            phone: None,
            property_id: Some("HSE-0042".to_string()),
            message: None,
            stage: Some(StageId::from("qualification")),
            source: LeadSource::Portal,
        },
        LeadSubmission {
            full_name: "Carla Mendes".to_string(),
            email: "carla.mendes@example.com".to_string(),
            phone: Some("(11) 3322-1100".to_string()),
            property_id: None,
            message: Some("Would like to visit on Saturday".to_string()),
            stage: Some(StageId::from("scheduled_visit")),
            source: LeadSource::Referral,
        },
        LeadSubmission {
            full_name: "Jo".to_string(),
            email: "jo@example".to_string(),
            phone: None,
            property_id: None,
            message: None,
            stage: None,
            source: LeadSource::Manual,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_walks_a_lead_across_the_board() {
        run_demo(DemoArgs {
            target_stage: Some("negotiation".to_string()),
            list_leads: true,
        })
        .expect("demo completes");
    }

    #[test]
    fn import_renders_board_for_a_portal_export() {
        let path = std::env::temp_dir().join(format!("realty-crm-import-{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "Name,Email,Phone,Property,Message,Stage,Source\n\
Ana Souza,ana@x.com,,AP-301,,qualification,website\n\
Al,al@x.com,,,,,\n",
        )
        .expect("write csv");

        let result = run_import(ImportArgs {
            csv: path.clone(),
            list_leads: false,
            json: false,
        });
        std::fs::remove_file(&path).ok();
        result.expect("import completes with one rejected row");
    }

    #[test]
    fn import_of_missing_file_is_an_error() {
        let result = run_import(ImportArgs {
            csv: PathBuf::from("/nonexistent/leads.csv"),
            list_leads: false,
            json: true,
        });
        assert!(matches!(result, Err(AppError::Import(_))));
    }
}
