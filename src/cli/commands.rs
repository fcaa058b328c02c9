//! Subcommand implementations

use super::args::RunArgs;
use crate::app::Settings;
use crate::container::{ContainerSession, ExecutionEnvironment, HostEnvironment};
use crate::pipeline::{
    resolve_pipeline, CancellationFlag, ExecutorOptions, PassthroughArgs, PipelineDefinition,
    PipelineExecutor, Selection,
};
use crate::session::{check_source, Session, SessionId};
use crate::subprocess::SubprocessManager;
use anyhow::Result;
use std::fmt::Write as _;
use tracing::{debug, info};

/// Apply the command-line overrides of `run` on top of the loaded settings
pub fn apply_run_overrides(settings: &mut Settings, args: &RunArgs) {
    if let Some(data_dir) = &args.data_dir {
        settings.data_dir = data_dir.clone();
    }
    if let Some(image) = &args.image {
        settings.container.image = image.clone();
    }
    if let Some(enabled) = args.container_override() {
        settings.container.enabled = enabled;
    }
}

/// Range selection unless `--entrypoint` or `--chain` asks for label chaining
pub fn selection_from_args(args: &RunArgs) -> Selection {
    if args.chain || args.entrypoint.is_some() {
        Selection::Chain {
            entrypoint: args.entrypoint.clone(),
        }
    } else {
        Selection::Range {
            first: args.from.clone(),
            last: args.to.clone(),
        }
    }
}

pub fn build_environment(
    settings: &Settings,
    subprocess: SubprocessManager,
) -> Box<dyn ExecutionEnvironment> {
    if settings.container.enabled {
        Box::new(ContainerSession::new(settings.container.clone(), subprocess))
    } else {
        Box::new(HostEnvironment::new(subprocess))
    }
}

/// `photopipe run`
pub async fn run_pipeline(
    args: RunArgs,
    passthrough: PassthroughArgs,
    mut settings: Settings,
    subprocess: SubprocessManager,
    cancellation: CancellationFlag,
) -> Result<()> {
    apply_run_overrides(&mut settings, &args);
    let definition = resolve_pipeline(&args.pipeline, settings.pipelines_dir.as_deref())?;
    let selection = selection_from_args(&args);
    debug!("Selection: {:?}", selection);

    let environment = build_environment(&settings, subprocess);
    let mut executor = PipelineExecutor::new(definition, environment)
        .with_options(ExecutorOptions {
            echo: args.echo,
            dry_run: args.dry_run,
        })
        .with_cancellation(cancellation);

    // Selection errors must surface before the session or container exists
    let plan = executor.plan(&selection, &passthrough)?;

    let session = Session::locate(
        SessionId::from_option(args.uid.clone()),
        args.output_dir.as_deref(),
        &settings.data_dir,
        settings.tools.clone(),
    )?;

    if args.dry_run {
        check_source(&args.source)?;
        println!(
            "Dry run of '{}' for session {} ({})",
            executor.definition().name,
            session.id(),
            session.paths().session_dir().display()
        );
        executor.execute(&plan, session.paths()).await?;
        return Ok(());
    }

    let ingest = session.prepare(&args.source)?;
    println!(
        "Session {} at {}",
        session.id(),
        session.paths().session_dir().display()
    );
    if ingest.skipped_in_place {
        info!("Source images already in the session input directory");
    } else {
        info!("Copied {} image(s) into the session", ingest.copied);
    }

    match executor.execute(&plan, session.paths()).await {
        Ok(report) => {
            println!("{}", report.summary());
            Ok(())
        }
        Err(e) => {
            if !executor.records().is_empty() {
                println!("{}", executor.report().summary());
            }
            println!("Resume with: photopipe run --uid {} ...", session.id());
            Err(e.into())
        }
    }
}

/// `photopipe steps`
pub fn list_steps(pipeline: &str, settings: &Settings) -> Result<()> {
    let definition = resolve_pipeline(pipeline, settings.pipelines_dir.as_deref())?;
    print!("{}", describe_pipeline(&definition));
    Ok(())
}

pub fn describe_pipeline(definition: &PipelineDefinition) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Pipeline '{}'", definition.name);
    if let Some(description) = &definition.description {
        let _ = writeln!(text, "  {}", description);
    }
    if let Some(entrypoint) = &definition.entrypoint {
        let _ = writeln!(text, "  entrypoint: {}", entrypoint);
    }
    let _ = writeln!(text);

    for (index, step) in definition.steps.iter().enumerate() {
        let _ = writeln!(
            text,
            "  {:>2}  {:<18} {}",
            index,
            step.label,
            step.executable()
        );
        if let Some(description) = &step.description {
            let _ = writeln!(text, "      {}", description);
        }
    }
    text
}
