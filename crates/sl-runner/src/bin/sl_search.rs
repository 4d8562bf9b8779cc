use anyhow::{bail, Context};
use sl_runner::RunDescriptor;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sl-search <validate|sample> <descriptor.json> [count]";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, path) = match (args.first(), args.get(1)) {
        (Some(command), Some(path)) => (command.as_str(), path.as_str()),
        _ => bail!(USAGE),
    };

    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let descriptor = RunDescriptor::from_json(&text).context("parsing run descriptor")?;
    let mut generator = descriptor
        .build_generator()
        .context("building candidate generator")?;

    info!(
        run_id = %descriptor.id,
        name = %descriptor.name,
        strategy = descriptor.generator.name(),
        parameters = descriptor.space.num_parameters(),
        total = ?generator.total_candidates(),
        "descriptor loaded"
    );

    match command {
        "validate" => {
            println!("{} is valid", path);
        }
        "sample" => {
            let count: usize = match args.get(2) {
                Some(n) => n.parse().with_context(|| format!("invalid count {n}"))?,
                None => 5,
            };
            for _ in 0..count {
                if !generator.has_more_candidates() {
                    break;
                }
                match generator.get_candidate() {
                    Ok(candidate) => println!("{}", serde_json::to_string(&candidate)?),
                    Err(e) if !e.is_fatal() => eprintln!("skipped: {e}"),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }

    Ok(())
}
