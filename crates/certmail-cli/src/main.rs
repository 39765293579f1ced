//! Certificate mailer executable
//!
//! Renders one certificate per CSV row and emails it, or re-runs the failed
//! rows of an earlier report.

use anyhow::{bail, Context, Result};
use certmail_core::services::{load_report, parse_recipients, write_archive, Compositor, EmailTemplate};
use certmail_core::{
    BatchOrchestrator, CancelHandle, CertmailConfig, DispatchSettings, MailTransport, Recipient, SmtpMailer,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

fn cli() -> Command {
    Command::new("certmail")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Render personalized certificates and deliver them by email")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("certmail.json"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .value_name("FILE")
                .help("CSV file with Name and Email columns")
                .conflicts_with("retry-report"),
        )
        .arg(
            Arg::new("retry-report")
                .long("retry-report")
                .value_name("FILE")
                .help("Re-run the undelivered rows of an earlier report"),
        )
        .arg(
            Arg::new("subject")
                .long("subject")
                .value_name("TEXT")
                .help("Email subject, may contain {{name}}"),
        )
        .arg(
            Arg::new("body")
                .long("body")
                .value_name("TEXT")
                .help("Email body, may contain {{name}}")
                .conflicts_with("body-file"),
        )
        .arg(
            Arg::new("body-file")
                .long("body-file")
                .value_name("FILE")
                .help("Read the email body from a file"),
        )
        .arg(
            Arg::new("report-out")
                .long("report-out")
                .value_name("FILE")
                .help("Write the batch report as JSON"),
        )
        .arg(
            Arg::new("preview")
                .long("preview")
                .value_name("NAME")
                .help("Render a single certificate for NAME and exit")
                .requires("preview-out"),
        )
        .arg(
            Arg::new("preview-out")
                .long("preview-out")
                .value_name("FILE")
                .help("Output for --preview (.pdf or .png)"),
        )
        .arg(
            Arg::new("zip-out")
                .long("zip-out")
                .value_name("FILE")
                .help("Render every certificate into a ZIP archive instead of sending"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Parse and validate the input without sending anything")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .context("--config has a default value")?;
    let mut config = CertmailConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    log::info!("Loaded configuration from {}", config_path);

    apply_email_overrides(&mut config, &matches)?;

    let compositor = Compositor::from_config(&config).context("Failed to prepare certificate template")?;

    if let Some(name) = matches.get_one::<String>("preview") {
        let out = matches
            .get_one::<String>("preview-out")
            .context("--preview requires --preview-out")?;
        return write_preview(&compositor, name, Path::new(out));
    }

    let rows = load_recipients(&matches)?;
    if rows.is_empty() {
        bail!("No valid recipients to process");
    }

    if let Some(out) = matches.get_one::<String>("zip-out") {
        return write_zip(&compositor, rows, Path::new(out));
    }

    let recipients: Vec<Recipient> = rows.into_iter().map(|(recipient, _)| recipient).collect();

    if matches.get_flag("dry-run") {
        log::info!("Dry run: {} recipients ready, nothing sent", recipients.len());
        return Ok(());
    }

    let transport: Arc<dyn MailTransport> =
        Arc::new(SmtpMailer::new(&config.smtp).context("Failed to configure SMTP")?);
    let orchestrator = BatchOrchestrator::new(
        compositor,
        transport,
        EmailTemplate::from_config(&config.email),
        DispatchSettings::from(&config.dispatch),
    );

    let cancel = CancelHandle::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, finishing in-flight sends");
                cancel.cancel();
            }
        }
    });

    let report = orchestrator.run(recipients, cancel.signal()).await;

    let json = report.to_json_pretty().context("Failed to serialize report")?;
    match matches.get_one::<String>("report-out") {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("Failed to write report to {}", path))?;
            log::info!("Report written to {}", path);
        }
        None => println!("{}", json),
    }

    let summary = report.summary();
    println!(
        "Delivered {}/{} ({} render failed, {} send failed, {} cancelled)",
        summary.delivered, summary.total, summary.render_failed, summary.send_failed, summary.cancelled
    );

    Ok(())
}

fn apply_email_overrides(config: &mut CertmailConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(subject) = matches.get_one::<String>("subject") {
        config.email.subject = subject.clone();
    }

    if let Some(body) = matches.get_one::<String>("body") {
        config.email.body = body.clone();
    } else if let Some(path) = matches.get_one::<String>("body-file") {
        config.email.body =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read body file {}", path))?;
    }

    Ok(())
}

/// Rows to process, with the certificate id an earlier run assigned (if any)
fn load_recipients(matches: &ArgMatches) -> Result<Vec<(Recipient, Option<Uuid>)>> {
    if let Some(path) = matches.get_one::<String>("csv") {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read CSV {}", path))?;
        let ingest = parse_recipients(&text).with_context(|| format!("Failed to parse CSV {}", path))?;
        return Ok(ingest.recipients.into_iter().map(|r| (r, None)).collect());
    }

    if let Some(path) = matches.get_one::<String>("retry-report") {
        let previous = load_report(path).with_context(|| format!("Failed to load report {}", path))?;

        let mut rows = Vec::new();
        for entry in previous.retry_candidates() {
            match Recipient::from_entry(entry) {
                Ok(recipient) => rows.push((recipient, entry.certificate_id)),
                Err(e) => log::warn!("Skipping row {} from {}: {}", entry.index, path, e),
            }
        }
        log::info!(
            "Retrying {} of {} rows from batch {}",
            rows.len(),
            previous.len(),
            previous.batch_id
        );
        return Ok(rows);
    }

    bail!("Either --csv or --retry-report is required")
}

/// Render all rows into one archive. Rows from a report keep their
/// certificate ids so serial numbers match what was sent.
fn write_zip(compositor: &Compositor, rows: Vec<(Recipient, Option<Uuid>)>, out: &Path) -> Result<()> {
    let rows: Vec<(Recipient, Uuid)> = rows
        .into_iter()
        .map(|(recipient, id)| (recipient, id.unwrap_or_else(Uuid::new_v4)))
        .collect();

    let file = std::fs::File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let summary = write_archive(compositor, &rows, file)
        .with_context(|| format!("Failed to write archive {}", out.display()))?;

    println!(
        "Wrote {} certificates to {} ({} skipped)",
        summary.entries.len(),
        out.display(),
        summary.skipped
    );
    Ok(())
}

fn write_preview(compositor: &Compositor, name: &str, out: &Path) -> Result<()> {
    let recipient = Recipient::new(name, "preview@example.com")?;
    let artifact = compositor
        .render(&recipient, Uuid::new_v4())
        .with_context(|| format!("Failed to render preview for '{}'", name))?;

    let is_pdf = out
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    let bytes = if is_pdf { &artifact.pdf } else { &artifact.png };
    std::fs::write(out, bytes).with_context(|| format!("Failed to write preview to {}", out.display()))?;

    log::info!(
        "Preview for '{}' written to {} (font size {}px{})",
        name,
        out.display(),
        artifact.fit.font_size,
        if artifact.fit.overflow { ", overflow" } else { "" }
    );
    Ok(())
}
