use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

use setcache::app::App;

fn init_tracing() {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("setcache=warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn usage() -> ! {
    eprintln!(
        "setcache - workout tracking client

USAGE:
    setcache <command> [args]

COMMANDS:
    login [username] [--remember]   Sign in (stores tokens; --remember keeps
                                    the password in the OS keychain)
    register <username>             Create an account and sign in
    logout                          Sign out and clear local data
    status                          Show session and draft state

    list [--refresh]                List workouts (cached, newest first)
    show <id>                       Show one workout with its exercises
    delete <id>                     Delete a workout

    exercises [--refresh]           List the exercise catalog
    exercises add <name> <group>    Add a custom exercise

    log add <exercise-id> <reps> [weights]
                                    Add an exercise to the workout draft,
                                    e.g. log add 4 10,8,8 100,100,90
    log status                      Show the draft
    log cancel                      Discard the draft
    log finish [name]               Submit the draft as a workout

    timer start|show|clear          Rest timer

    stats volume                    Weekly volume totals
    stats frequency                 Weekly workout counts
    stats top [n]                   Highest-volume workouts
    stats groups [days]             Volume by muscle group (default 30 days)

Set SETCACHE_API_URL to point at a different server."
    );
    std::process::exit(2);
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn positional(args: &[String]) -> Vec<&String> {
    args.iter().filter(|a| !a.starts_with("--")).collect()
}

fn parse_id(s: &str) -> Result<i64> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("'{}' is not a workout id", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        usage();
    };
    let rest = &args[1..];
    let pos = positional(rest);

    let mut app = App::new()?;

    match command {
        "login" => {
            app.login(pos.first().map(|s| s.as_str()), has_flag(rest, "--remember"))
                .await?
        }
        "register" => match pos.first() {
            Some(username) => app.register(username).await?,
            None => bail!("usage: setcache register <username>"),
        },
        "logout" => app.logout()?,
        "status" => app.status()?,

        "list" => app.list(has_flag(rest, "--refresh")).await?,
        "show" => match pos.first() {
            Some(id) => app.show(parse_id(id)?).await?,
            None => bail!("usage: setcache show <id>"),
        },
        "delete" => match pos.first() {
            Some(id) => app.delete(parse_id(id)?).await?,
            None => bail!("usage: setcache delete <id>"),
        },

        "exercises" => match pos.first().map(|s| s.as_str()) {
            Some("add") => match (pos.get(1), pos.get(2)) {
                (Some(name), Some(group)) => app.add_exercise(name, group).await?,
                _ => bail!("usage: setcache exercises add <name> <muscle-group>"),
            },
            _ => app.exercises(has_flag(rest, "--refresh")).await?,
        },

        "log" => match pos.first().map(|s| s.as_str()) {
            Some("add") => match (pos.get(1), pos.get(2)) {
                (Some(id), Some(reps)) => {
                    app.log_add(parse_id(id)?, reps, pos.get(3).map(|s| s.as_str()))
                        .await?
                }
                _ => bail!("usage: setcache log add <exercise-id> <reps> [weights]"),
            },
            Some("status") => app.log_status()?,
            Some("cancel") => app.log_cancel()?,
            Some("finish") => app.log_finish(pos.get(1).map(|s| s.as_str())).await?,
            _ => bail!("usage: setcache log add|status|cancel|finish"),
        },

        "timer" => match pos.first().map(|s| s.as_str()) {
            Some("start") => app.timer_start()?,
            Some("show") => app.timer_show()?,
            Some("clear") => app.timer_clear()?,
            _ => bail!("usage: setcache timer start|show|clear"),
        },

        "stats" => match pos.first().map(|s| s.as_str()) {
            Some("volume") => app.stats_volume().await?,
            Some("frequency") => app.stats_frequency().await?,
            Some("top") => {
                let count = pos
                    .get(1)
                    .map(|s| s.parse::<usize>())
                    .transpose()
                    .map_err(|_| anyhow::anyhow!("stats top expects a number"))?
                    .unwrap_or(5);
                app.stats_top(count).await?
            }
            Some("groups") => {
                let days = pos
                    .get(1)
                    .map(|s| s.parse::<i64>())
                    .transpose()
                    .map_err(|_| anyhow::anyhow!("stats groups expects a number of days"))?
                    .unwrap_or(30);
                app.stats_groups(days).await?
            }
            _ => bail!("usage: setcache stats volume|frequency|top|groups"),
        },

        "help" | "--help" | "-h" => usage(),
        other => {
            eprintln!("Unknown command: {}", other);
            usage();
        }
    }

    Ok(())
}
