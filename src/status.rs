use anyhow::Result;

use crate::config::Config;

/// Print configuration and credential health, without contacting Salesforce.
pub fn print_status(config: &Config) -> Result<()> {
    let sf = &config.salesforce;

    println!("{:<22} {}", "login url", sf.login_url);
    println!("{:<22} {}", "api version", sf.api_version);
    println!("{:<22} {}", "object", sf.object);
    println!("{:<22} {}", "sentiment field", sf.sentiment_field);
    println!("{:<22} {}", "created field", sf.created_field);
    println!("{:<22} {}", "timezone", config.timezone()?);
    println!("{:<22} {}", "default period", config.default_period()?.label());
    println!("{:<22} {}", "default chart", config.default_chart()?.title());
    println!();

    println!("{:<24} {:<16} SET", "VARIABLE", "CREDENTIAL");
    let mut ready = true;
    for (label, var) in [
        ("username", &sf.username_env),
        ("password", &sf.password_env),
        ("security token", &sf.security_token_env),
    ] {
        let set = std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false);
        ready &= set;
        println!("{:<24} {:<16} {}", var, label, set);
    }

    println!();
    if ready {
        println!("ready");
    } else {
        println!("credentials missing: set the variables above to run reports");
    }

    Ok(())
}
