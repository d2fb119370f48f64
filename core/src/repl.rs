//! Line-oriented driver over the two controllers. Rendering only; all
//! behavior lives in `identity` and `portal`.

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use common::{
    env_config::Config,
    misc::display_timestamp,
    notice::{Notice, NoticeKind},
};
use identity::controller::{AuthMode, SessionController};
use portal::{
    controller::{ActiveView, PortalController},
    export::write_export,
};
use store::{
    client::RecordStore,
    models::{profile::Region, verification::VerificationRecord},
};
use url::Url;
use uuid::Uuid;

pub async fn run(
    config: Arc<Config>,
    mut session: SessionController,
    store: Arc<dyn RecordStore>,
) -> std::io::Result<()> {
    println!("{}", "Aussie Verify".bold());
    println!("Confidence checks for contractors and trades. Type help for commands.");

    let stdin = std::io::stdin();
    let mut portal: Option<PortalController> = None;
    let mut line = String::new();

    loop {
        session.pump_events();
        match (session.authenticated().cloned(), portal.is_some()) {
            (Some(identity), false) => {
                let mut opened = PortalController::new(store.clone(), identity);
                opened.refresh_all().await;
                show_notice(opened.take_notice());
                portal = Some(opened);
            }
            (None, true) => portal = None,
            _ => {}
        }

        prompt(&session, portal.as_ref())?;
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
        let rest = rest.trim();

        match cmd {
            "quit" | "exit" => break,
            "help" => help(),
            "whoami" => match session.authenticated() {
                Some(identity) => println!("{} ({})", identity.email, identity.id),
                None => println!("Not signed in."),
            },
            "mode" => match rest {
                "login" => session.set_mode(AuthMode::Login),
                "register" => session.set_mode(AuthMode::Register),
                "forgot" => session.set_mode(AuthMode::Forgot),
                _ => println!("Usage: mode <login|register|forgot>"),
            },
            "login" => match split_two(rest) {
                Some((email, password)) => {
                    session.set_mode(AuthMode::Login);
                    session.login(email, password).await;
                }
                None => println!("Usage: login <email> <password>"),
            },
            "register" => match split_two(rest) {
                Some((email, password)) => {
                    session.set_mode(AuthMode::Register);
                    session.register(email, password).await;
                }
                None => println!("Usage: register <email> <password>"),
            },
            "forgot" => {
                if rest.is_empty() {
                    println!("Usage: forgot <email>");
                } else {
                    session.set_mode(AuthMode::Forgot);
                    session.send_reset(rest).await;
                }
            }
            "recover" => match Url::parse(rest) {
                Ok(url) => session.open_recovery(&url).await,
                Err(_) => println!("Usage: recover <url from the reset email>"),
            },
            "passwd" => {
                if rest.is_empty() {
                    println!("Usage: passwd <new password>");
                } else {
                    session.update_password(rest).await;
                }
            }
            "logout" => session.sign_out().await,
            "refresh" => match portal.as_mut() {
                Some(p) => p.refresh_all().await,
                None => println!("Login first."),
            },
            "view" => match portal.as_mut() {
                Some(p) => match rest {
                    "dashboard" => p.set_view(ActiveView::Dashboard),
                    "new" => p.set_view(ActiveView::NewCheck),
                    "history" => p.set_view(ActiveView::History),
                    "profile" => p.set_view(ActiveView::Profile),
                    _ => println!("Usage: view <dashboard|new|history|profile>"),
                },
                None => println!("Login first."),
            },
            "ls" => match portal.as_ref() {
                Some(p) => {
                    let matches = p.filtered_records(rest);
                    if matches.is_empty() {
                        println!("  No matching checks.");
                    }
                    for record in matches {
                        print_record(record);
                    }
                }
                None => println!("Login first."),
            },
            "stats" => match portal.as_ref() {
                Some(p) => {
                    let counts = p.counts();
                    println!(
                        "  total: {}   {}: {}   {}: {}   {}: {}",
                        counts.total,
                        "verified".green(),
                        counts.verified,
                        "review".yellow(),
                        counts.review,
                        "flagged".red(),
                        counts.flagged,
                    );
                }
                None => println!("Login first."),
            },
            "draft" => match portal.as_mut() {
                Some(p) => match rest.split_once(' ') {
                    Some((field, value)) => set_draft_field(p, field, value.trim()),
                    None => print_draft(p),
                },
                None => println!("Login first."),
            },
            "save" => match portal.as_mut() {
                Some(p) => p.add_record().await,
                None => println!("Login first."),
            },
            "rm" => match portal.as_mut() {
                Some(p) => match Uuid::parse_str(rest) {
                    Ok(id) => p.remove_record(id).await,
                    Err(_) => println!("Usage: rm <record id>"),
                },
                None => println!("Login first."),
            },
            "profile" => match portal.as_mut() {
                Some(p) => match rest.split_once(' ') {
                    Some((field, value)) => set_profile_field(p, field, value.trim()),
                    None => print_profile(p),
                },
                None => println!("Login first."),
            },
            "saveprofile" => match portal.as_mut() {
                Some(p) => p.save_profile().await,
                None => println!("Login first."),
            },
            "export" => match portal.as_ref() {
                Some(p) => {
                    let document = p.export_document();
                    let today = chrono::Local::now().date_naive();
                    match write_export(&config.export_dir, &document, today) {
                        Ok(path) => show_notice(Some(
                            Notice::success("Exported").with_body(path.display().to_string()),
                        )),
                        Err(err) => show_notice(Some(err.to_notice("Couldn't export"))),
                    }
                }
                None => println!("Login first."),
            },
            _ => println!("Unknown command: {}. Type help.", cmd),
        }

        show_notice(session.take_notice());
        if let Some(p) = portal.as_mut() {
            show_notice(p.take_notice());
        }
    }
    Ok(())
}

/// Without service configuration every command answers with the same
/// configuration-missing notice.
pub fn run_degraded(notice: &Notice) {
    print_notice(notice);
    println!("Commands are disabled until the service is configured. Type quit to exit.");
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let input = line.trim();
        if input == "quit" || input == "exit" {
            break;
        }
        if !input.is_empty() {
            print_notice(notice);
        }
    }
}

fn prompt(session: &SessionController, portal: Option<&PortalController>) -> std::io::Result<()> {
    let tag = match portal {
        Some(p) => format!("portal:{}", view_name(p.view())),
        None => session.mode().label().replace(' ', "-"),
    };
    print!("{} ", format!("[{}]>", tag).bold());
    std::io::stdout().flush()
}

fn view_name(view: ActiveView) -> &'static str {
    match view {
        ActiveView::Dashboard => "dashboard",
        ActiveView::NewCheck => "new",
        ActiveView::History => "history",
        ActiveView::Profile => "profile",
    }
}

fn help() {
    println!("  login <email> <password>      sign in");
    println!("  register <email> <password>   create an account");
    println!("  forgot <email>                send a password reset email");
    println!("  recover <url>                 open a reset link from the email");
    println!("  passwd <new password>         set a new password (recovery mode)");
    println!("  mode <login|register|forgot>  switch auth mode");
    println!("  logout | whoami");
    println!("  refresh                       reload profile and records");
    println!("  ls [query]                    list (and search) records");
    println!("  stats                         outcome counts");
    println!("  draft [field value]           show or edit the new check");
    println!("  save                          save the drafted check");
    println!("  rm <record id>                delete a record");
    println!("  profile [field value]         show or edit your profile");
    println!("  saveprofile                   save profile changes");
    println!("  view <tab> | export | quit");
}

fn split_two(rest: &str) -> Option<(&str, &str)> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => Some((first, second)),
        _ => None,
    }
}

fn set_draft_field(portal: &mut PortalController, field: &str, value: &str) {
    let draft = portal.draft_mut();
    match field {
        "name" => draft.contractor_name = value.to_string(),
        "trade" => draft.trade = value.to_string(),
        "abn" => draft.abn = value.to_string(),
        "licence" => draft.licence = value.to_string(),
        "insurance" => draft.insurance = value.to_string(),
        "notes" => draft.notes = value.to_string(),
        "outcome" => match value.parse() {
            Ok(outcome) => draft.outcome = outcome,
            Err(err) => show_notice(Some(err.to_notice("Couldn't set outcome"))),
        },
        _ => println!("Draft fields: name trade abn licence insurance notes outcome"),
    }
}

fn print_draft(portal: &PortalController) {
    let draft = portal.draft();
    println!("  name:      {}", draft.contractor_name);
    println!("  trade:     {}", draft.trade);
    println!("  abn:       {}", draft.abn);
    println!("  licence:   {}", draft.licence);
    println!("  insurance: {}", draft.insurance);
    println!("  notes:     {}", draft.notes);
    println!("  outcome:   {}", draft.outcome.label());
}

fn set_profile_field(portal: &mut PortalController, field: &str, value: &str) {
    let profile = portal.profile_mut();
    match field {
        "org" => profile.org_name = value.to_string(),
        "role" => profile.role = value.to_string(),
        "phone" => profile.phone = value.to_string(),
        "state" => match value.parse::<Region>() {
            Ok(region) => profile.state = region,
            Err(err) => show_notice(Some(err.to_notice("Couldn't set state"))),
        },
        _ => println!("Profile fields: org role phone state"),
    }
}

fn print_profile(portal: &PortalController) {
    let profile = portal.profile();
    println!("  org:   {}", profile.org_name);
    println!("  role:  {}", profile.role);
    println!("  phone: {}", profile.phone);
    println!("  state: {}", profile.state.code());
    if let Some(updated_at) = &profile.updated_at {
        println!("  updated: {}", display_timestamp(updated_at));
    }
}

fn print_record(record: &VerificationRecord) {
    println!(
        "  {}  {}  {}  {}",
        record.id.to_string().dimmed(),
        display_timestamp(&record.created_at),
        outcome_colored(record),
        record.contractor_name.bold(),
    );
    let mut details = Vec::new();
    if !record.trade.is_empty() {
        details.push(format!("trade: {}", record.trade));
    }
    if !record.abn.is_empty() {
        details.push(format!("abn: {}", record.abn));
    }
    if !record.licence.is_empty() {
        details.push(format!("licence: {}", record.licence));
    }
    if !record.insurance.is_empty() {
        details.push(format!("insurance: {}", record.insurance));
    }
    if !details.is_empty() {
        println!("      {}", details.join("  "));
    }
    if !record.notes.is_empty() {
        println!("      notes: {}", record.notes);
    }
}

fn outcome_colored(record: &VerificationRecord) -> colored::ColoredString {
    use store::models::verification::Outcome;
    match record.outcome {
        Outcome::Verified => record.outcome.label().green(),
        Outcome::Review => record.outcome.label().yellow(),
        Outcome::Flagged => record.outcome.label().red(),
    }
}

fn show_notice(notice: Option<Notice>) {
    if let Some(notice) = notice {
        print_notice(&notice);
    }
}

fn print_notice(notice: &Notice) {
    let title = match notice.kind {
        NoticeKind::Success => notice.title.green().bold(),
        NoticeKind::Error => notice.title.red().bold(),
        NoticeKind::Info => notice.title.yellow().bold(),
    };
    match &notice.body {
        Some(body) => println!("{}: {}", title, body),
        None => println!("{}", title),
    }
}
