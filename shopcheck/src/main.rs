use shopcheck::{run_suites, HarnessConfig, Suite, SuiteContext};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shopcheck=info".parse()?),
        )
        .init();

    let suites: Vec<Suite> = {
        let names: Vec<String> = std::env::args().skip(1).collect();
        if names.is_empty() {
            Suite::ALL.to_vec()
        } else {
            names
                .iter()
                .map(|n| n.parse())
                .collect::<Result<_, _>>()?
        }
    };

    let config = HarnessConfig::from_env();
    info!("Running {} suite(s) against {}", suites.len(), config.base_url);

    let ctx = SuiteContext::from_config(config)?;
    let reports = run_suites(&suites, &ctx).await?;

    let mut failed = 0;
    for report in &reports {
        let passed = report.checks.iter().filter(|c| c.passed()).count();
        info!(suite = %report.suite, passed, total = report.checks.len(), "suite finished");
        for failure in report.failures() {
            failed += 1;
            error!(
                suite = %report.suite,
                check = %failure.name,
                "{}",
                failure.error.as_deref().unwrap_or_default()
            );
        }
    }

    if failed > 0 {
        anyhow::bail!("{} check(s) failed", failed);
    }
    info!("All checks passed");
    Ok(())
}
