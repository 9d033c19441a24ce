// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use radventure_app::{
    CaseId, CatalogCommand, CatalogState, Clock, EventId, Modality, NewNotification,
    NotificationQueue, OfferId, ProductId, ProfileId, PurchaseError, ShopService, SystemClock,
    load_listings,
};
use radventure_db::Store;
use radventure_db::validation::{
    format_compact_radcoins, format_radcoins, parse_difficulty_range, parse_id, parse_modality,
    parse_optional_datetime, parse_radcoins, parse_tags,
};
use radventure_edge::EdgeService;
use std::env;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "RADVENTURE_LOG";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `radventure --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_logging(config.log_filter())?;

    let mut edge_config = config.edge_config()?;
    if let Command::ServeEdge {
        listen: Some(listen),
    } = &options.command
    {
        edge_config.listen = listen.clone();
    }

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    if let Command::ServeEdge { .. } = options.command {
        let service = EdgeService::new(&edge_config)?;
        if options.check_only {
            return Ok(());
        }
        let server = radventure_edge::bind(&edge_config.listen)?;
        return radventure_edge::serve(&service, &server);
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or RADVENTURE_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        runtime::seed_demo(&store)?;
    }
    if options.check_only {
        EdgeService::new(&edge_config)?;
        info!(db = %db_path.display(), "startup check passed");
        return Ok(());
    }

    let mut toasts =
        NotificationQueue::with_default_duration(SystemClock, config.notification_duration()?);
    let outcome = match &options.command {
        Command::Summary => print_summary(&store),
        Command::Cases(query) => print_cases(&store, query),
        Command::Shop => print_shop(&store),
        Command::Purchase {
            user,
            product,
            offer,
        } => purchase(&store, &mut toasts, *user, *product, *offer),
        Command::Answer { user, case, choice } => {
            answer(&store, &mut toasts, *user, *case, *choice)
        }
        Command::Profile { user, acknowledge } => print_profile(&store, *user, *acknowledge),
        Command::EditCase { case, edits } => edit_case(&store, &mut toasts, *case, edits),
        Command::EditEvent { event, edits } => edit_event(&store, &mut toasts, *event, edits),
        Command::ServeEdge { .. } => Ok(()),
    };
    print_notifications(&mut toasts);
    outcome
}

fn init_logging(config_filter: &str) -> Result<()> {
    let filter = match env::var(LOG_ENV) {
        Ok(raw) if !raw.trim().is_empty() => EnvFilter::try_new(&raw)
            .with_context(|| format!("parse {LOG_ENV}={raw:?} as a log filter"))?,
        _ => EnvFilter::try_new(config_filter).with_context(|| {
            format!("parse [log].filter {config_filter:?}; use a filter like \"info\" or \"radventure_db=debug\"")
        })?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))
}

fn print_summary(store: &Store) -> Result<()> {
    let profiles = store.list_profiles()?;
    let held: i64 = profiles
        .iter()
        .map(|profile| profile.radcoin_balance)
        .fold(0, i64::saturating_add);
    println!(
        "{} cases, {} events, {} products, {} learners holding {}",
        store.list_cases()?.len(),
        store.list_events()?.len(),
        store.list_products(false)?.len(),
        profiles.len(),
        format_compact_radcoins(held)
    );
    Ok(())
}

fn print_cases(store: &Store, query: &CaseQuery) -> Result<()> {
    let mut catalog = CatalogState::default();
    catalog.load(store.list_cases()?);
    for command in query.catalog_commands() {
        let events = catalog.dispatch(command);
        debug!(?events, "catalog updated");
    }

    for case in catalog.cases.page_items() {
        println!(
            "{:>5}  {}  {:<13}  {:<16}  {}",
            case.id.get(),
            "*".repeat(usize::try_from(case.difficulty_level).unwrap_or(0)),
            case.modality.label(),
            case.specialty,
            case.title
        );
    }
    println!(
        "page {} of {}, {} matching of {} cases",
        catalog.cases.page() + 1,
        catalog.cases.page_count(),
        catalog.cases.visible_len(),
        catalog.cases.records().len()
    );
    if let Some(status) = &catalog.status_line {
        println!("{status}");
    }
    Ok(())
}

fn print_shop(store: &Store) -> Result<()> {
    let listings = load_listings(store, OffsetDateTime::now_utc())?;
    if listings.is_empty() {
        println!("the shop has no active products");
        return Ok(());
    }
    for listing in listings {
        let offer = match &listing.offer {
            Some(offer) => format!(
                "  offer {} ({}% off, was {})",
                offer.id,
                offer.discount_percent,
                format_radcoins(listing.product.price)
            ),
            None => String::new(),
        };
        println!(
            "{:>4}  {:>10}  {}{offer}",
            listing.product.id.get(),
            format_radcoins(listing.price),
            listing.product.name
        );
    }
    Ok(())
}

fn purchase<C: Clock>(
    store: &Store,
    toasts: &mut NotificationQueue<C>,
    user: ProfileId,
    product: Option<ProductId>,
    offer: Option<OfferId>,
) -> Result<()> {
    let result = match (product, offer) {
        (_, Some(offer)) => ShopService::purchase_offer(store, user, offer),
        (Some(product), None) => ShopService::purchase_product(store, user, product),
        (None, None) => bail!("purchase requires --product <id> or --offer <id>"),
    };
    match result {
        Ok(receipt) => {
            toasts.add(
                NewNotification::success("Purchase complete").with_message(format!(
                    "paid {}, balance now {}",
                    format_radcoins(receipt.price_paid),
                    format_radcoins(receipt.balance_after)
                )),
            );
            Ok(())
        }
        Err(error @ PurchaseError::InsufficientBalance { .. }) => {
            toasts.add(NewNotification::warning("Not enough RadCoins").with_message(error.to_string()));
            bail!("purchase declined")
        }
        Err(error) => {
            toasts.error_toast("Purchase failed", &anyhow::Error::new(error));
            bail!("purchase failed")
        }
    }
}

fn answer<C: Clock>(
    store: &Store,
    toasts: &mut NotificationQueue<C>,
    user: ProfileId,
    case: CaseId,
    choice: usize,
) -> Result<()> {
    let outcome = store.submit_answer(user, case, choice)?;
    if outcome.correct {
        let detail = if outcome.points_awarded > 0 {
            format!(
                "+{} points, +{}",
                outcome.points_awarded,
                format_radcoins(outcome.radcoins_awarded)
            )
        } else {
            "already solved, no new reward".to_owned()
        };
        toasts.add(NewNotification::success("Correct").with_message(detail));
    } else {
        toasts.add(NewNotification::info("Not quite").with_message("review the explanation and try again"));
    }
    if let Some(level) = store.pending_level_up(user)? {
        toasts.add(
            NewNotification::success(format!("Level {level} reached"))
                .with_message("run `radventure profile --user <id> --ack` to dismiss")
                .sticky(),
        );
    }
    Ok(())
}

fn print_profile(store: &Store, user: ProfileId, acknowledge: bool) -> Result<()> {
    let profile = store.get_profile(user)?;
    let progress = store.level_progress(user)?;
    let benefits = store.user_benefits(user)?.benefits;
    println!("{} <{}>", profile.full_name, profile.email);
    println!(
        "level {} ({} points, {} to next), balance {}",
        progress.level,
        progress.total_points,
        progress.points_to_next,
        format_radcoins(profile.radcoin_balance)
    );
    println!(
        "aids: {} elimination, {} skip, {} AI tutor",
        benefits.elimination_aids, benefits.skip_aids, benefits.ai_tutor_credits
    );
    if acknowledge {
        store.complete_onboarding(user)?;
        store.acknowledge_level(user, progress.level)?;
        println!("level {} acknowledged", progress.level);
    } else if let Some(level) = store.pending_level_up(user)? {
        println!("new level {level} not yet acknowledged");
    }
    Ok(())
}

fn edit_case<C: Clock>(
    store: &Store,
    toasts: &mut NotificationQueue<C>,
    case: CaseId,
    edits: &CaseEdits,
) -> Result<()> {
    let mut wizard = runtime::edit_case_wizard(store, case)?;
    let form = wizard.data_mut();
    if let Some(title) = &edits.title {
        form.title = title.clone();
    }
    if let Some(tags) = &edits.tags {
        form.tags = tags.clone();
    }
    let saved = runtime::submit_review(&mut wizard, &mut runtime::CaseEditSink::new(store, case));
    report_edit(toasts, "Case", saved)
}

fn edit_event<C: Clock>(
    store: &Store,
    toasts: &mut NotificationQueue<C>,
    event: EventId,
    edits: &EventEdits,
) -> Result<()> {
    let mut wizard = runtime::edit_event_wizard(store, event)?;
    let form = wizard.data_mut();
    if let Some(name) = &edits.name {
        form.name = name.clone();
    }
    if edits.starts_at.is_some() {
        form.starts_at = edits.starts_at;
    }
    if edits.ends_at.is_some() {
        form.ends_at = edits.ends_at;
    }
    if let Some(prize_pool) = edits.prize_pool {
        form.prize_pool = prize_pool;
    }
    let saved =
        runtime::submit_review(&mut wizard, &mut runtime::EventEditSink::new(store, event));
    report_edit(toasts, "Event", saved)
}

fn report_edit<C: Clock>(
    toasts: &mut NotificationQueue<C>,
    what: &str,
    saved: Result<()>,
) -> Result<()> {
    match saved {
        Ok(()) => {
            toasts.add(NewNotification::success(format!("{what} updated")));
            Ok(())
        }
        Err(error) => {
            toasts.error_toast(format!("{what} not saved"), &error);
            Err(error)
        }
    }
}

fn print_notifications<C: Clock>(toasts: &mut NotificationQueue<C>) {
    for toast in toasts.visible() {
        match &toast.message {
            Some(message) => eprintln!("[{}] {}: {message}", toast.kind.as_str(), toast.title),
            None => eprintln!("[{}] {}", toast.kind.as_str(), toast.title),
        }
    }
    toasts.clear();
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CaseQuery {
    search: Option<String>,
    specialties: Vec<String>,
    modalities: Vec<Modality>,
    difficulty: Option<(Option<i32>, Option<i32>)>,
    sort: Option<String>,
    descending: bool,
    page: usize,
}

impl CaseQuery {
    fn catalog_commands(&self) -> Vec<CatalogCommand> {
        let mut commands = Vec::new();
        if let Some(search) = &self.search {
            commands.push(CatalogCommand::SetSearch(search.clone()));
        }
        for specialty in &self.specialties {
            commands.push(CatalogCommand::ToggleSpecialty(specialty.clone()));
        }
        for modality in &self.modalities {
            commands.push(CatalogCommand::ToggleModality(*modality));
        }
        if let Some((min, max)) = self.difficulty {
            commands.push(CatalogCommand::SetDifficulty { min, max });
        }
        if let Some(field) = &self.sort {
            commands.push(CatalogCommand::SortBy(field.clone()));
            if self.descending {
                commands.push(CatalogCommand::SortBy(field.clone()));
            }
        }
        for _ in 1..self.page {
            commands.push(CatalogCommand::NextPage);
        }
        commands
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CaseEdits {
    title: Option<String>,
    tags: Option<Vec<String>>,
}

impl CaseEdits {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EventEdits {
    name: Option<String>,
    starts_at: Option<OffsetDateTime>,
    ends_at: Option<OffsetDateTime>,
    prize_pool: Option<i64>,
}

impl EventEdits {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.starts_at.is_none()
            && self.ends_at.is_none()
            && self.prize_pool.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Summary,
    Cases(CaseQuery),
    Shop,
    Purchase {
        user: ProfileId,
        product: Option<ProductId>,
        offer: Option<OfferId>,
    },
    Answer {
        user: ProfileId,
        case: CaseId,
        choice: usize,
    },
    Profile {
        user: ProfileId,
        acknowledge: bool,
    },
    EditCase {
        case: CaseId,
        edits: CaseEdits,
    },
    EditEvent {
        event: EventId,
        edits: EventEdits,
    },
    ServeEdge {
        listen: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Command,
}

const COMMANDS: [&str; 8] = [
    "cases",
    "shop",
    "purchase",
    "answer",
    "profile",
    "edit-case",
    "edit-event",
    "serve-edge",
];

/// Which command each command-specific flag belongs to.
fn flag_commands(flag: &str) -> &'static [&'static str] {
    match flag {
        "--search" | "--specialty" | "--modality" | "--difficulty" | "--sort" | "--desc"
        | "--page" => &["cases"],
        "--user" => &["purchase", "answer", "profile"],
        "--product" | "--offer" => &["purchase"],
        "--case" => &["answer", "edit-case"],
        "--choice" => &["answer"],
        "--ack" => &["profile"],
        "--title" | "--tags" => &["edit-case"],
        "--event" | "--name" | "--starts" | "--ends" | "--prize-pool" => &["edit-event"],
        "--listen" => &["serve-edge"],
        _ => &[],
    }
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: Command::Summary,
    };

    let mut command_name: Option<String> = None;
    let mut used_flags: Vec<String> = Vec::new();
    let mut query = CaseQuery::default();
    let mut user = None;
    let mut product = None;
    let mut offer = None;
    let mut case = None;
    let mut choice = None;
    let mut acknowledge = false;
    let mut listen = None;
    let mut case_edits = CaseEdits::default();
    let mut event = None;
    let mut event_edits = EventEdits::default();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        if !flag_commands(arg).is_empty() {
            used_flags.push(arg.to_owned());
        }
        match arg {
            "--config" => {
                options.config_path = PathBuf::from(next_value(&mut iter, arg, "a file path")?);
            }
            "--print-config-path" => options.print_config_path = true,
            "--print-path" => options.print_db_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            "--help" | "-h" => options.show_help = true,
            "--search" => query.search = Some(next_value(&mut iter, arg, "a search term")?),
            "--specialty" => query
                .specialties
                .push(next_value(&mut iter, arg, "a specialty")?),
            "--modality" => {
                let raw = next_value(&mut iter, arg, "a modality")?;
                let modality = parse_modality(&raw).map_err(|error| {
                    anyhow!(
                        "--modality {raw:?}: {error}; expected one of: {}",
                        Modality::ALL.map(Modality::as_str).join(", ")
                    )
                })?;
                query.modalities.push(modality);
            }
            "--difficulty" => {
                let raw = next_value(&mut iter, arg, "a MIN:MAX range")?;
                let range = parse_difficulty_range(&raw)
                    .map_err(|error| anyhow!("--difficulty {raw:?}: {error}"))?;
                query.difficulty = Some(range);
            }
            "--sort" => query.sort = Some(next_value(&mut iter, arg, "a field name")?),
            "--desc" => query.descending = true,
            "--page" => {
                let raw = next_value(&mut iter, arg, "a page number")?;
                let page = parse_id(&raw).map_err(|error| anyhow!("--page {raw:?}: {error}"))?;
                query.page = usize::try_from(page).context("page number too large")?;
            }
            "--user" => user = Some(ProfileId::new(id_value(&mut iter, arg)?)),
            "--product" => product = Some(ProductId::new(id_value(&mut iter, arg)?)),
            "--offer" => offer = Some(OfferId::new(id_value(&mut iter, arg)?)),
            "--case" => case = Some(CaseId::new(id_value(&mut iter, arg)?)),
            "--choice" => {
                let position = id_value(&mut iter, arg)?;
                choice = Some(usize::try_from(position - 1).context("choice too large")?);
            }
            "--ack" => acknowledge = true,
            "--title" => case_edits.title = Some(next_value(&mut iter, arg, "a case title")?),
            "--tags" => {
                let raw = next_value(&mut iter, arg, "comma-separated tags")?;
                case_edits.tags = Some(parse_tags(&raw));
            }
            "--event" => event = Some(EventId::new(id_value(&mut iter, arg)?)),
            "--name" => event_edits.name = Some(next_value(&mut iter, arg, "an event name")?),
            "--starts" => event_edits.starts_at = Some(datetime_value(&mut iter, arg)?),
            "--ends" => event_edits.ends_at = Some(datetime_value(&mut iter, arg)?),
            "--prize-pool" => {
                let raw = next_value(&mut iter, arg, "a RadCoin amount")?;
                let amount =
                    parse_radcoins(&raw).map_err(|error| anyhow!("--prize-pool {raw:?}: {error}"))?;
                event_edits.prize_pool = Some(amount);
            }
            "--listen" => listen = Some(next_value(&mut iter, arg, "an address like 127.0.0.1:8787")?),
            name if COMMANDS.contains(&name) && command_name.is_none() => {
                command_name = Some(name.to_owned());
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    let name = command_name.as_deref().unwrap_or("");
    for flag in &used_flags {
        let owners = flag_commands(flag);
        if !owners.contains(&name) {
            bail!("{flag} only applies to `{}`", owners.join("`, `"));
        }
    }

    let require_user = || user.ok_or_else(|| anyhow!("`{name}` requires --user <id>"));
    options.command = match name {
        "" => Command::Summary,
        "cases" => {
            if query.descending && query.sort.is_none() {
                bail!("--desc needs --sort <field> -- pick a field to sort by and retry");
            }
            Command::Cases(query)
        }
        "shop" => Command::Shop,
        "purchase" => {
            if product.is_some() == offer.is_some() {
                bail!("`purchase` takes exactly one of --product <id> or --offer <id>");
            }
            Command::Purchase {
                user: require_user()?,
                product,
                offer,
            }
        }
        "answer" => Command::Answer {
            user: require_user()?,
            case: case.ok_or_else(|| anyhow!("`answer` requires --case <id>"))?,
            choice: choice.ok_or_else(|| anyhow!("`answer` requires --choice <n>"))?,
        },
        "profile" => Command::Profile {
            user: require_user()?,
            acknowledge,
        },
        "edit-case" => {
            if case_edits.is_empty() {
                bail!("`edit-case` needs at least one of --title or --tags");
            }
            Command::EditCase {
                case: case.ok_or_else(|| anyhow!("`edit-case` requires --case <id>"))?,
                edits: case_edits,
            }
        }
        "edit-event" => {
            if event_edits.is_empty() {
                bail!("`edit-event` needs at least one of --name, --starts, --ends or --prize-pool");
            }
            Command::EditEvent {
                event: event.ok_or_else(|| anyhow!("`edit-event` requires --event <id>"))?,
                edits: event_edits,
            }
        }
        "serve-edge" => Command::ServeEdge { listen },
        other => bail!("unknown command {other:?}"),
    };
    Ok(options)
}

fn next_value<I, S>(iter: &mut I, flag: &str, what: &str) -> Result<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    iter.next()
        .map(|value| value.as_ref().to_owned())
        .ok_or_else(|| anyhow!("{flag} requires {what}"))
}

fn id_value<I, S>(iter: &mut I, flag: &str) -> Result<i64>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let raw = next_value(iter, flag, "an id")?;
    parse_id(&raw).map_err(|error| anyhow!("{flag} {raw:?}: {error}"))
}

fn datetime_value<I, S>(iter: &mut I, flag: &str) -> Result<OffsetDateTime>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let raw = next_value(iter, flag, "a date like 2026-05-01")?;
    parse_optional_datetime(&raw)
        .map_err(|error| anyhow!("{flag} {raw:?}: {error}; use YYYY-MM-DD or RFC 3339"))?
        .ok_or_else(|| anyhow!("{flag} requires a date like 2026-05-01"))
}

fn print_help() {
    println!("radventure");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Run against seeded demo data (in-memory)");
    println!("  --check                  Validate config + DB + edge settings");
    println!("  --help                   Show this help");
    println!();
    println!("commands:");
    println!("  cases [--search T] [--specialty S]... [--modality M]... [--difficulty MIN:MAX]");
    println!("        [--sort FIELD] [--desc] [--page N]");
    println!("  shop");
    println!("  purchase --user ID (--product ID | --offer ID)");
    println!("  answer --user ID --case ID --choice N");
    println!("  profile --user ID [--ack]");
    println!("  edit-case --case ID [--title T] [--tags A,B]");
    println!("  edit-event --event ID [--name T] [--starts DATE] [--ends DATE] [--prize-pool N]");
    println!("  serve-edge [--listen ADDR]");
}

#[cfg(test)]
mod tests {
    use super::{CaseEdits, CaseQuery, CliOptions, Command, EventEdits, parse_cli_args};
    use anyhow::Result;
    use radventure_app::{CaseId, CatalogCommand, EventId, Modality, ProductId, ProfileId};
    use std::path::PathBuf;
    use time::macros::datetime;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/radventure-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
                command: Command::Summary,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_demo_check_and_print_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--demo", "--print-path", "--check"],
            default_options_path(),
        )?;
        assert!(options.demo);
        assert!(options.print_db_path);
        assert!(options.check_only);
        assert!(!options.print_config_path);
        Ok(())
    }

    #[test]
    fn cases_command_collects_filters() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--demo",
                "cases",
                "--search",
                "fracture",
                "--specialty",
                "Musculoskeletal",
                "--modality",
                "X-Ray",
                "--modality",
                "ct",
                "--difficulty",
                "2:",
                "--sort",
                "difficulty_level",
                "--desc",
                "--page",
                "2",
            ],
            default_options_path(),
        )?;
        let Command::Cases(query) = options.command else {
            panic!("expected cases command");
        };
        assert_eq!(
            query,
            CaseQuery {
                search: Some("fracture".to_owned()),
                specialties: vec!["Musculoskeletal".to_owned()],
                modalities: vec![Modality::XRay, Modality::Ct],
                difficulty: Some((Some(2), None)),
                sort: Some("difficulty_level".to_owned()),
                descending: true,
                page: 2,
            }
        );
        let commands = query.catalog_commands();
        assert_eq!(
            commands.iter().filter(|command| matches!(command, CatalogCommand::SortBy(_))).count(),
            2
        );
        assert_eq!(commands.last(), Some(&CatalogCommand::NextPage));
        Ok(())
    }

    #[test]
    fn purchase_requires_user_and_one_target() -> Result<()> {
        let options = parse_cli_args(
            vec!["purchase", "--user", "3", "--product", "2"],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Command::Purchase {
                user: ProfileId::new(3),
                product: Some(ProductId::new(2)),
                offer: None,
            }
        );

        let error = parse_cli_args(vec!["purchase", "--user", "3"], default_options_path())
            .expect_err("missing target should fail");
        assert!(error.to_string().contains("exactly one"));

        let error = parse_cli_args(vec!["purchase", "--product", "2"], default_options_path())
            .expect_err("missing user should fail");
        assert!(error.to_string().contains("--user"));
        Ok(())
    }

    #[test]
    fn answer_choice_is_one_based() -> Result<()> {
        let options = parse_cli_args(
            vec!["answer", "--user", "1", "--case", "7", "--choice", "2"],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Command::Answer {
                user: ProfileId::new(1),
                case: CaseId::new(7),
                choice: 1,
            }
        );
        assert!(
            parse_cli_args(
                vec!["answer", "--user", "1", "--case", "7", "--choice", "0"],
                default_options_path()
            )
            .is_err()
        );
        Ok(())
    }

    #[test]
    fn command_flags_are_rejected_on_other_commands() {
        let error = parse_cli_args(vec!["shop", "--search", "x"], default_options_path())
            .expect_err("search on shop should fail");
        assert!(error.to_string().contains("--search only applies to `cases`"));
    }

    #[test]
    fn edit_case_parses_title_and_tags() -> Result<()> {
        let options = parse_cli_args(
            vec!["edit-case", "--case", "4", "--tags", "trauma, Neuro,,trauma"],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Command::EditCase {
                case: CaseId::new(4),
                edits: CaseEdits {
                    title: None,
                    tags: Some(vec!["trauma".to_owned(), "Neuro".to_owned()]),
                },
            }
        );

        let error = parse_cli_args(vec!["edit-case", "--case", "4"], default_options_path())
            .expect_err("no edits should fail");
        assert!(error.to_string().contains("at least one"));
        Ok(())
    }

    #[test]
    fn edit_event_parses_dates_and_prize_pool() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "edit-event",
                "--event",
                "2",
                "--starts",
                "2026-05-01",
                "--ends",
                "2026-05-03T18:00:00Z",
                "--prize-pool",
                "1,500",
            ],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Command::EditEvent {
                event: EventId::new(2),
                edits: EventEdits {
                    name: None,
                    starts_at: Some(datetime!(2026-05-01 00:00 UTC)),
                    ends_at: Some(datetime!(2026-05-03 18:00 UTC)),
                    prize_pool: Some(1500),
                },
            }
        );

        let error = parse_cli_args(
            vec!["edit-event", "--event", "2", "--starts", "05/01/2026"],
            default_options_path(),
        )
        .expect_err("bad date should fail");
        assert!(error.to_string().contains("--starts"));

        let error = parse_cli_args(
            vec!["edit-event", "--event", "2", "--prize-pool", "-5"],
            default_options_path(),
        )
        .expect_err("negative pool should fail");
        assert!(error.to_string().contains("--prize-pool"));

        let error = parse_cli_args(
            vec!["edit-case", "--case", "1", "--name", "x"],
            default_options_path(),
        )
        .expect_err("event flag on edit-case should fail");
        assert!(error.to_string().contains("--name only applies to `edit-event`"));
        Ok(())
    }

    #[test]
    fn desc_without_sort_is_rejected() {
        let error = parse_cli_args(vec!["cases", "--desc"], default_options_path())
            .expect_err("--desc alone should fail");
        assert!(error.to_string().contains("--desc needs --sort"));
    }

    #[test]
    fn bad_values_name_the_flag() {
        let error = parse_cli_args(vec!["cases", "--modality", "pet"], default_options_path())
            .expect_err("unknown modality should fail");
        assert!(error.to_string().contains("--modality"));

        let error = parse_cli_args(vec!["cases", "--difficulty", "9:"], default_options_path())
            .expect_err("difficulty out of range should fail");
        assert!(error.to_string().contains("--difficulty"));
    }

    #[test]
    fn serve_edge_accepts_listen_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["serve-edge", "--listen", "0.0.0.0:9999"],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Command::ServeEdge {
                listen: Some("0.0.0.0:9999".to_owned())
            }
        );
        Ok(())
    }
}
