use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // No secrets in this list
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "COMANDA_HOST",
        "COMANDA_PORT",
        "COMANDA_DATABASE_URL",
        "COMANDA_POINTS_REWARD_RATE",
        "COMANDA_MINIMUM_CHARGE",
        "COMANDA_AMOUNT_TOLERANCE",
        "COMANDA_CURRENCY",
        "COMANDA_STRIPE_API_URL",
        "COMANDA_STRIPE_TIMEOUT_SECS",
        "COMANDA_WEBHOOK_TOLERANCE_SECS",
        "COMANDA_RECONCILE_INTERVAL_SECS",
        "COMANDA_STALE_PAYMENT_AGE_MINS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
