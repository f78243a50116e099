use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pivot_dashboard::dashboard::session::{HELP, SessionCommand};
use pivot_dashboard::{
    AggregateOp, ChartKind, Dashboard, DashboardConfig, DashboardView, Selection, render_html,
};

#[derive(Parser, Debug)]
#[command(
    name = "pivot-dashboard",
    version,
    about = "Pivot a CSV file and render the result as an HTML dashboard",
    after_help = r#"
EXAMPLES:
  pivot-dashboard --data sales.csv fields
  pivot-dashboard render --rows region --columns category --values sales --agg sum
  pivot-dashboard render --values quantity,sales --agg mean --chart heatmap -o out.html
  pivot-dashboard interactive
"#
)]
struct Cli {
    /// TOML config file (defaults to ./pivot-dashboard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// CSV file to load, overrides `data_path` from the config
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one interaction and write the HTML page
    Render(RenderArgs),
    /// Read selection commands from stdin, re-rendering after each change
    Interactive {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the dataset columns and their inferred types
    Fields,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(long, value_delimiter = ',')]
    rows: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    values: Vec<String>,

    #[arg(long, value_enum, default_value_t = AggArg::Count)]
    agg: AggArg,

    #[arg(long, value_enum, default_value_t = ChartArg::Bar)]
    chart: ChartArg,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AggArg {
    Count,
    Sum,
    #[value(alias = "avg", alias = "average")]
    Mean,
    Min,
    Max,
}

impl From<AggArg> for AggregateOp {
    fn from(arg: AggArg) -> Self {
        match arg {
            AggArg::Count => AggregateOp::Count,
            AggArg::Sum => AggregateOp::Sum,
            AggArg::Mean => AggregateOp::Mean,
            AggArg::Min => AggregateOp::Min,
            AggArg::Max => AggregateOp::Max,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChartArg {
    Bar,
    Line,
    Scatter,
    Heatmap,
}

impl From<ChartArg> for ChartKind {
    fn from(arg: ChartArg) -> Self {
        match arg {
            ChartArg::Bar => ChartKind::Bar,
            ChartArg::Line => ChartKind::Line,
            ChartArg::Scatter => ChartKind::Scatter,
            ChartArg::Heatmap => ChartKind::Heatmap,
        }
    }
}

fn main() -> Result<()> {
    // stdout carries the tables, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config =
        DashboardConfig::load(cli.config.as_deref()).context("invalid configuration")?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }

    match cli.command {
        Command::Render(args) => render(config, args),
        Command::Interactive { output } => {
            if let Some(output) = output {
                config.output_path = output;
            }
            interactive(config)
        }
        Command::Fields => {
            let mut dashboard = Dashboard::new(config);
            let path = dashboard.config().data_path.clone();
            let processor = dashboard
                .dataset()
                .with_context(|| format!("failed to load {}", path.display()))?;
            print_fields(&processor, skipped_lines(&dashboard));
            Ok(())
        }
    }
}

fn render(mut config: DashboardConfig, args: RenderArgs) -> Result<()> {
    if let Some(output) = args.output {
        config.output_path = output;
    }
    let selection = Selection {
        rows: args.rows,
        columns: args.columns,
        values: args.values,
        aggfunc: args.agg.into(),
        chart: args.chart.into(),
    };

    let mut dashboard = Dashboard::new(config);
    let view = interact(&mut dashboard, &selection)?;
    println!("{view}");
    write_page(&dashboard, &view)
}

fn interactive(config: DashboardConfig) -> Result<()> {
    let mut dashboard = Dashboard::new(config);
    let mut selection = Selection::default();

    let view = interact(&mut dashboard, &selection)?;
    println!("{view}");
    write_page(&dashboard, &view)?;
    println!("type 'help' for commands");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        stdout.flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<SessionCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match &command {
            SessionCommand::Quit => break,
            SessionCommand::Help => {
                println!("{HELP}");
                continue;
            }
            SessionCommand::Fields => {
                match dashboard.dataset() {
                    Ok(processor) => print_fields(&processor, skipped_lines(&dashboard)),
                    Err(e) => error!(error = %e, "failed to load dataset"),
                }
                continue;
            }
            _ => {}
        }

        command.apply(&mut selection);
        println!("{selection}");
        match interact(&mut dashboard, &selection) {
            Ok(view) => {
                println!("{view}");
                write_page(&dashboard, &view)?;
            }
            Err(e) => error!(error = %e, "interaction failed"),
        }
    }
    Ok(())
}

fn interact(dashboard: &mut Dashboard, selection: &Selection) -> Result<DashboardView> {
    let path = dashboard.config().data_path.clone();
    dashboard
        .interact(selection)
        .with_context(|| format!("failed to load {}", path.display()))
}

fn write_page(dashboard: &Dashboard, view: &DashboardView) -> Result<()> {
    let config = dashboard.config();
    let html = render_html(view, &config.plotly_src)?;
    write_file(&config.output_path, &html)?;
    info!(path = %config.output_path.display(), "dashboard written");
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn skipped_lines(dashboard: &Dashboard) -> usize {
    dashboard
        .datasets()
        .summary()
        .map_or(0, |summary| summary.errors.len())
}

fn print_fields(processor: &pivot_dashboard::ColumnarProcessor, skipped: usize) {
    let width = processor
        .headers()
        .iter()
        .map(|h| h.chars().count())
        .max()
        .unwrap_or(0);
    let fields = processor.headers().iter().zip(processor.column_types());
    for (idx, (name, column_type)) in fields.enumerate() {
        let missing = processor.column(idx).map_or(0, |c| c.null_count());
        println!("{name:<width$}  {:<7}  {missing} missing", column_type.name());
    }
    println!("{} records", processor.row_count());
    if skipped > 0 {
        println!("{skipped} lines skipped");
    }
}
