//! Check encoder, probe and font availability.

use subburn_common::config::AppConfig;
use subburn_render_engine::encoder::command_exists;
use subburn_render_engine::FontRegistry;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Subburn System Check");
    println!("{}", "=".repeat(50));

    let render = &config.render;
    let encoder_ok = report(
        "Encoder",
        &render.encoder_path.display().to_string(),
        command_exists(&render.encoder_path),
    );
    let probe_ok = report(
        "Probe",
        &render.probe_path.display().to_string(),
        command_exists(&render.probe_path),
    );
    let font_ok = report(
        "Default font",
        &render.default_font.display().to_string(),
        FontRegistry::from_config(render).default_available(),
    );

    match &render.fonts_dir {
        Some(dir) if dir.is_dir() => println!("[OK] Fonts directory: {}", dir.display()),
        Some(dir) => println!("[WARN] Fonts directory: {} (not found)", dir.display()),
        None => println!("[INFO] Fonts directory: not configured, default font only"),
    }

    println!("     Scratch directory: {}", render.temp_root().display());
    println!(
        "     Workers: {}, rate limit: {} per {}ms, attempts: {}",
        config.queue.workers,
        config.queue.rate_limit_max,
        config.queue.rate_limit_window_ms,
        config.queue.max_attempts
    );

    println!();
    if encoder_ok && probe_ok && font_ok {
        println!("All required tools are available. Subburn is ready.");
    } else {
        println!("Some required tools are missing. See above for fixes.");
    }

    Ok(())
}

fn report(label: &str, target: &str, available: bool) -> bool {
    if available {
        println!("[OK] {label}: {target}");
    } else {
        println!("[MISSING] {label}: {target}");
    }
    available
}
