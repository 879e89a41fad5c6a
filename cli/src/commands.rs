use std::path::Path;

use duetimer_core::{
    EngineConfigExt, ExpressionKind, OwnerScope, StartTimer, StartTimerDeployment, TickReport,
    TimerEvent,
};

use crate::context::{CliContext, Creation, parse_definition, parse_iso_duration};
use crate::driver;
use crate::scenario::Scenario;

pub async fn create(
    ctx: &CliContext,
    owner: OwnerScope,
    target: &str,
    kind: ExpressionKind,
    definition: &str,
) -> Result<(), String> {
    let definition = parse_definition(kind, definition)?;
    let mut engine = ctx.engine.lock().await;
    match engine
        .create(owner, target, &definition)
        .map_err(|e| e.to_string())?
    {
        Creation::Created(handle) => {
            println!("{} due at {}", handle.key, handle.due_date.to_rfc3339());
        }
        Creation::Incident(incident) => println!("incident: {}", incident.message),
    }
    Ok(())
}

pub async fn deploy(
    ctx: &CliContext,
    process: &str,
    start: Option<(&str, ExpressionKind, &str)>,
) -> Result<(), String> {
    let start_timers = match start {
        Some((target, kind, text)) => vec![StartTimer::new(target, parse_definition(kind, text)?)],
        None => Vec::new(),
    };

    let mut engine = ctx.engine.lock().await;
    let (key, results) = engine
        .deploy(process, start_timers)
        .map_err(|e| e.to_string())?;
    println!("deployed '{process}' as definition {key}");
    for result in results {
        match result {
            StartTimerDeployment::Created(handle) => {
                println!("  start timer {} due at {}", handle.key, handle.due_date.to_rfc3339());
            }
            StartTimerDeployment::Skipped => println!("  unchanged, start timer kept"),
        }
    }
    Ok(())
}

pub async fn undeploy(ctx: &CliContext, process: &str) -> Result<(), String> {
    let mut engine = ctx.engine.lock().await;
    let canceled = engine
        .undeploy(process)
        .ok_or_else(|| format!("process '{process}' was never deployed"))?;
    println!("canceled {canceled} start timers");
    Ok(())
}

pub async fn cancel(ctx: &CliContext, owner: OwnerScope, target: Option<&str>) {
    let canceled = ctx.engine.lock().await.cancel(owner, target);
    println!("canceled {canceled} timers");
}

pub async fn set_variable(ctx: &CliContext, name: &str, value: &str) {
    ctx.engine.lock().await.set_variable(name, value);
}

pub async fn advance(ctx: &CliContext, by: &str) -> Result<(), String> {
    let by = parse_iso_duration(by)?;
    ctx.clock.advance(by);
    tick(ctx).await
}

pub async fn tick(ctx: &CliContext) -> Result<(), String> {
    let mut engine = ctx.engine.lock().await;
    let report = engine.tick().map_err(|e| e.to_string())?;
    print_report(&report, engine.now());
    Ok(())
}

fn print_report(report: &TickReport, now: duetimer_core::Timestamp) {
    println!(
        "tick at {}: {} triggered{}",
        now.to_rfc3339(),
        report.triggered.len(),
        if report.yielded() { " (yielded)" } else { "" }
    );
    if let Some(next) = report.next_due {
        println!("next due at {}", next.to_rfc3339());
    }
}

pub async fn list(ctx: &CliContext) {
    let engine = ctx.engine.lock().await;
    let store = engine.manager.store();
    if store.is_empty() {
        println!("No live timers");
        return;
    }

    println!("{:<12} {:<28} {:<20} Owner", "Key", "Due", "Target");
    println!("{}", "-".repeat(90));
    for timer in store.iter() {
        let remaining = match timer.repetitions_remaining {
            Some(n) if timer.repetition.is_some() => format!(" [{n} left]"),
            None => " [repeats]".to_string(),
            Some(_) => String::new(),
        };
        println!(
            "{:<12} {:<28} {:<20} {}{}",
            timer.key.to_string(),
            timer.due_date.to_rfc3339(),
            timer.target_element_id,
            timer.owner,
            remaining
        );
    }
    println!("\nTotal: {} timers", store.len());
}

pub async fn journal(ctx: &CliContext) {
    let engine = ctx.engine.lock().await;
    for event in &engine.journal {
        match event {
            TimerEvent::Created(timer) => {
                println!("created   {} due {}", timer.key, timer.due_date.to_rfc3339())
            }
            TimerEvent::Triggered { timer, outcome } => {
                println!("triggered {} -> {:?}", timer.key, outcome)
            }
            TimerEvent::Canceled(timer) => println!("canceled  {}", timer.key),
            TimerEvent::IncidentRaised(incident) => {
                println!("incident  {} ({})", incident.message, incident.owner)
            }
        }
    }
    println!("\nTotal: {} events", engine.journal.len());
}

pub async fn processes(ctx: &CliContext) {
    let engine = ctx.engine.lock().await;
    for (process, key) in engine.deployments.processes() {
        let live = engine.manager.store().start_timers_of(key).count();
        println!("{process:<30} definition {key:<6} {live} start timers");
    }
}

pub async fn fail_next(ctx: &CliContext) {
    ctx.engine.lock().await.interpreter.fail_next();
    println!("next delivery will fail");
}

pub async fn run_scenario(ctx: &CliContext, path: &str) -> Result<(), String> {
    let scenario = Scenario::load(Path::new(path))?;
    let mut engine = ctx.engine.lock().await;
    let summary = scenario.run(&mut engine, &ctx.clock)?;
    println!(
        "ran {} steps: {} triggered, {} incidents, {} failed ticks",
        summary.steps, summary.triggered, summary.incidents, summary.failed_ticks
    );
    Ok(())
}

pub async fn serve(ctx: &CliContext) -> Result<(), String> {
    let mut slot = ctx.driver.lock().await;
    if slot.is_some() {
        return Err("tick driver already running".to_string());
    }
    let period = ctx.config.read().await.tick_interval();
    *slot = Some(driver::spawn(ctx.clone(), period));
    println!("ticking every {}ms", period.as_millis());
    Ok(())
}

pub async fn stop(ctx: &CliContext) {
    let handle = ctx.driver.lock().await.take();
    match handle {
        Some(handle) => {
            handle.stop().await;
            println!("tick driver stopped");
        }
        None => println!("tick driver not running"),
    }
}

pub async fn show_config(ctx: &CliContext) {
    let config = ctx.config.read().await;
    match duetimer_core::EngineConfig::config_path() {
        Ok(path) => println!("config file: {}", path.display()),
        Err(e) => println!("config file: unavailable ({e})"),
    }
    println!("tick_interval_ms = {}", config.tick_interval_ms);
    println!("yield_budget_ms = {}", config.yield_budget_ms);
    println!("logging.file_enabled = {}", config.logging.file_enabled);
    println!("logging.max_size_mb = {}", config.logging.max_size_mb);
    println!("logging.debug = {}", config.logging.debug);
}

pub async fn exit(ctx: &CliContext) {
    if let Some(handle) = ctx.driver.lock().await.take() {
        handle.stop().await;
    }
    println!("quitting...");
}
