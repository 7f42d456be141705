//! Non-interactive commands: one request, printed to stdout.

use std::path::Path;

use anyhow::{bail, Result};
use atos_core::chart::{format_brl, format_percent};
use atos_core::dashboard::LOAD_ERROR_TEXT;
use atos_core::{AtosClient, AxisKeyPolicy, BlobRegistry, Dashboard, Message, MessageBody, Report};
use colored::*;

use crate::render;

const TERMINAL_WIDTH: usize = 80;

fn print_message(message: &Message, policy: AxisKeyPolicy) {
    match &message.body {
        MessageBody::Text => println!("{}", message.content),
        MessageBody::Chart(spec) => {
            println!("{}", message.content);
            println!(
                "\n{}",
                format!("📈 Gráfico ({})", spec.visualization.as_str()).bold().magenta()
            );
            for line in render::chart_lines(spec, policy, TERMINAL_WIDTH) {
                println!("{}", line.magenta());
            }
        }
        MessageBody::Report(Report::Link(url)) => {
            println!("{}", "📊 Relatório CSV disponível:".bold().green());
            println!("   {}", url.underline());
        }
        MessageBody::Report(_) => match message.csv_table() {
            Some(table) => {
                for (i, line) in render::table_lines(&table, 50, 24).into_iter().enumerate() {
                    if i == 0 {
                        println!("{}", line.bold());
                    } else {
                        println!("{}", line);
                    }
                }
            }
            None => println!("{}", message.content.green()),
        },
    }
}

/// Ask one question. File reports are written to `out_dir`.
pub async fn ask(client: &AtosClient, question: &str, policy: AxisKeyPolicy, out_dir: &Path) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    println!("🤖 {} {}\n", "Perguntando:".bold().cyan(), question);

    let blobs = BlobRegistry::new();
    let result = match client.analyze(question).await {
        Ok(result) => result,
        Err(e) => {
            println!("{}", e.user_message().red());
            return Err(e.into());
        }
    };

    let message = Message::from_analysis(1, result, &blobs);
    print_message(&message, policy);

    if let Some(file) = message.report_file() {
        let path = blobs.save(&file.url, out_dir)?;
        println!(
            "\n💾 {} {}",
            format!("{} salvo em", file.file_type.display_name()).bold().green(),
            path.display()
        );
    }

    Ok(())
}

pub async fn report(client: &AtosClient, question: &str, policy: AxisKeyPolicy) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    match client.csv_report(question).await {
        Ok(response) => {
            print_message(&Message::from_csv_report(1, response), policy);
            Ok(())
        }
        Err(e) => {
            println!("{}", atos_core::error::REPORT_FAILURE_TEXT.red());
            Err(e.into())
        }
    }
}

pub async fn dashboard(client: &AtosClient) -> Result<()> {
    let dashboard = Dashboard::load(client).await;

    println!("\n{}", "📊 Dashboard de Vendas".bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    match &dashboard.sales {
        Ok(sales) => {
            println!("\n{} {}", "Vendas Mensais".bold().green(), format!("({})", sales.subtitle).dimmed());
            for line in render::bar_lines(&sales.series, TERMINAL_WIDTH) {
                println!("  {}", line);
            }
            println!("  {} {}", "Total:".bold(), format_brl(sales.total));
            println!("  {} {}", "Média:".bold(), format_brl(sales.average));
        }
        Err(e) => println!("\n{}: {}", "Vendas Mensais".bold(), e.red()),
    }

    match &dashboard.clients {
        Ok(clients) => {
            println!("\n{}", "Captação de Clientes".bold().green());
            for c in &clients.clients {
                println!(
                    "  • {} {} {} {}",
                    c.name,
                    format_brl(c.value).yellow(),
                    format_percent(c.percent).cyan(),
                    format!("({} pedidos)", c.orders).dimmed()
                );
            }
        }
        Err(e) => println!("\n{}: {}", "Captação de Clientes".bold(), e.red()),
    }

    match &dashboard.sellers {
        Ok(sellers) => {
            println!("\n{}", "Vendedores".bold().green());
            for (i, s) in sellers.sellers.iter().enumerate() {
                println!(
                    "  {}. {} {} {}",
                    (i + 1).to_string().bold().blue(),
                    s.name,
                    format_brl(s.total_sold).yellow(),
                    format_percent(s.percent).cyan()
                );
            }
        }
        Err(e) => println!("\n{}: {}", "Vendedores".bold(), e.red()),
    }

    println!(
        "\n{} {}",
        "Anos:".bold(),
        dashboard.selectable_years().join(", ")
    );

    if dashboard.sales.is_err() && dashboard.clients.is_err() {
        bail!(LOAD_ERROR_TEXT);
    }
    Ok(())
}

pub async fn years(client: &AtosClient) -> Result<()> {
    let years = client.years().await?;
    if years.is_empty() {
        println!("{}", "Nenhum ano disponível".yellow());
    }
    for year in years {
        println!("  • {}", year.green());
    }
    Ok(())
}

pub async fn status(client: &AtosClient) -> Result<()> {
    println!("🔌 {} {}", "API:".bold(), client.base_url().cyan());
    match client.root().await {
        Ok(root) => {
            println!("{} {}", "✅ Online".bold().green(), root.message.unwrap_or_default());
            Ok(())
        }
        Err(e) => {
            println!("{}: {}", "❌ Offline".bold().red(), e);
            Err(e.into())
        }
    }
}
