use std::path::PathBuf;

use wingflap::config::{display_env, ConfigSource};
use wingflap::display::{DisplayConfig, DisplayProjector};

fn main() {
    tracing_subscriber::fmt::init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"));
    let env = display_env();

    println!("Checking display configuration in {} (env \"{}\")...\n", dir.display(), env);

    let loaded = DisplayConfig::load(&dir, &env);
    match &loaded.source {
        ConfigSource::Override(path) | ConfigSource::Production(path) | ConfigSource::Default(path) => {
            println!("✓ Loaded {}", path.display());
        }
        ConfigSource::BuiltIn => {
            println!("✗ No configuration file could be loaded, using the built-in display");
        }
    }

    let projector = DisplayProjector::default();
    let projections = projector.project_all(&loaded.config);

    for (i, (display, projection)) in loaded.config.displays.iter().zip(&projections).enumerate() {
        println!(
            "\nDisplay {}: {:.2} x {:.2} m at ({:.2}, {:.2}, {:.2})",
            i + 1,
            display.width,
            display.height,
            display.center_position.x,
            display.center_position.y,
            display.center_position.z
        );

        let issues = display.validate();
        if issues.is_empty() {
            println!("  ✓ Valid");
        }
        for issue in &issues {
            println!("  ✗ {}", issue);
        }

        if let Some(p) = projection {
            println!("  Horizontal FOV: {:.2} deg", p.horizontal_fov);
            println!("  Vertical FOV:   {:.2} deg", p.vertical_fov);
            println!("  Aspect:         {:.3}", p.aspect);
        }
    }

    let active = projections.iter().filter(|p| p.is_some()).count();
    println!("\n{} of {} display(s) active", active, loaded.config.len());
}
