use std::error::Error;

use tracing::debug;

use mitsuke_api::backend::BackendClient;
use mitsuke_api::jikan::JikanClient;
use mitsuke_api::traits::{CatalogAnime, CatalogPage, ProfilePatch, RegistrationFields};
use mitsuke_core::config::AppConfig;
use mitsuke_core::fetch::FetchOutcome;
use mitsuke_core::messages::MessageBoard;
use mitsuke_core::models::{ListRecordPatch, MalId, RecordId, UserId};
use mitsuke_core::scope::{Scoped, ViewScope};
use mitsuke_runtime::{feedback, MutationOutcome, Runtime, RuntimeError};

use crate::print;
use crate::Command;

type CliResult = Result<(), Box<dyn Error>>;

const CANCELLED: &str = "cancelled";

pub struct App {
    runtime: Runtime<JikanClient, BackendClient>,
    /// Owns the token every request of this invocation runs under.
    scope: ViewScope,
    json: bool,
}

impl App {
    pub fn open(config: AppConfig, json: bool) -> Result<Self, RuntimeError> {
        let runtime = Runtime::open(config)?;
        let scope = ViewScope::new();

        let token = scope.token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupted, cancelling");
                token.cancel();
            }
        });

        Ok(Self {
            runtime,
            scope,
            json,
        })
    }

    pub async fn dispatch(&self, command: Command) -> CliResult {
        let cancel = self.scope.token();
        let rt = &self.runtime;

        match command {
            // ── Account ─────────────────────────────────────────
            Command::Login { username, password } => {
                let user = rt.login(&username, &password).await?;
                println!("Signed in as {} (#{}).", user.username, user.user_id);
            }
            Command::Logout => {
                rt.logout()?;
                println!("Signed out.");
            }
            Command::Whoami => match rt.current_user() {
                Some(user) if self.json => print::json(&user)?,
                Some(user) => println!("{} <{}> (#{})", user.username, user.email, user.user_id),
                None => println!("Not signed in."),
            },
            Command::Register {
                username,
                email,
                first_name,
                last_name,
                password,
            } => {
                let fields = RegistrationFields {
                    username,
                    email,
                    first_name,
                    last_name,
                    password,
                };
                let user = rt.register(&fields).await?;
                println!(
                    "Registered {}. Check {} for a verification link.",
                    user.username, user.email
                );
            }
            Command::Verify { token } => println!("{}", rt.verify_account(&token).await?),
            Command::ResendVerification { user_id } => {
                rt.resend_verification(UserId(user_id)).await?;
                println!("Verification mail sent.");
            }
            Command::ForgotPassword { email } => println!("{}", rt.forgot_password(&email).await?),
            Command::ResetPassword {
                token,
                password,
                confirm,
            } => {
                let message = rt
                    .reset_password(token.as_deref(), &password, &confirm)
                    .await?;
                println!("{message}");
            }
            Command::Profile => print::profile(&rt.profile().await?),
            Command::UpdateProfile {
                username,
                email,
                first_name,
                last_name,
                password,
            } => {
                let user = rt
                    .update_profile(ProfilePatch {
                        username,
                        email,
                        first_name,
                        last_name,
                        password,
                    })
                    .await?;
                println!("Profile updated for {}.", user.username);
            }

            // ── Catalog ─────────────────────────────────────────
            Command::Top => self.show_page(rt.top_anime(&cancel).await)?,
            Command::Seasonal => self.show_page(rt.airing_now(&cancel).await)?,
            Command::Upcoming => self.show_page(rt.upcoming(&cancel).await)?,
            Command::Browse { page } => self.show_page(rt.browse(page, &cancel).await)?,
            Command::Search { query, page } => {
                self.show_page(rt.search(&query, page, &cancel).await?)?;
            }
            Command::Genre { ids } => self.show_page(rt.by_genres(&ids, &cancel).await?)?,
            Command::Details { mal_id } => match rt.details(mal_id, &cancel).await {
                Ok(Scoped::Done(details)) if self.json => print::json(&details)?,
                Ok(Scoped::Done(details)) => print::details(&details),
                Ok(Scoped::Cancelled) => return Err(CANCELLED.into()),
                Err(RuntimeError::NotFound) => return Err(feedback::NO_RESULTS.into()),
                Err(RuntimeError::Unavailable) => return Err(feedback::FETCH_FAILED.into()),
                Err(e) => return Err(e.into()),
            },
            Command::Recommend { safe_search } => {
                let Scoped::Done(items) = rt.recommendations(safe_search, &cancel).await? else {
                    return Err(CANCELLED.into());
                };
                self.show_anime(&items)?;
            }

            // ── Watch list ──────────────────────────────────────
            Command::List => {
                let Scoped::Done(entries) = rt.load_my_list(&cancel).await? else {
                    return Err(CANCELLED.into());
                };
                if self.json {
                    print::json(&entries)?;
                } else {
                    print::entries(&entries);
                }
            }
            Command::Add { mal_id } => {
                let board = rt.message_board();
                let outcome = rt.add_to_list(mal_id, &board).await?;
                report(&board, outcome)?;
            }
            Command::Edit {
                record_id,
                status,
                rating,
                episodes,
            } => {
                let patch = ListRecordPatch {
                    status,
                    rating,
                    episodes_watched: episodes,
                };
                if patch.is_empty() {
                    return Err("nothing to change; pass --status, --rating or --episodes".into());
                }
                self.ensure_list_loaded().await?;
                let board = rt.message_board();
                let outcome = rt.edit_record(RecordId(record_id), patch, &board).await?;
                report(&board, outcome)?;
            }
            Command::Remove { record_id } => {
                self.ensure_list_loaded().await?;
                let board = rt.message_board();
                let outcome = rt.remove_record(RecordId(record_id), &board).await?;
                report(&board, outcome)?;
            }

            Command::Config { init } => self.show_config(init)?,
        }
        Ok(())
    }

    /// Edits look records up in the cache, which starts empty each run.
    async fn ensure_list_loaded(&self) -> CliResult {
        match self.runtime.load_my_list(&self.scope.token()).await? {
            Scoped::Done(_) => Ok(()),
            Scoped::Cancelled => Err(CANCELLED.into()),
        }
    }

    fn show_config(&self, init: bool) -> CliResult {
        let config = self.runtime.config();
        if init {
            let path = config.save()?;
            println!("Wrote {}", path.display());
            return Ok(());
        }
        if self.json {
            print::json(config)?;
        } else {
            println!("# {}", AppConfig::config_path().display());
            print!("{}", toml::to_string_pretty(config)?);
        }
        Ok(())
    }

    fn show_page(&self, outcome: FetchOutcome<CatalogPage>) -> CliResult {
        match outcome {
            FetchOutcome::Ready(page) => {
                self.show_anime(&page.items)?;
                if page.has_next && !self.json {
                    println!("(more on the next page)");
                }
                Ok(())
            }
            FetchOutcome::Cancelled => Err(CANCELLED.into()),
            other => Err(feedback::outcome_message(&other)
                .unwrap_or(feedback::FETCH_FAILED)
                .into()),
        }
    }

    fn show_anime(&self, items: &[CatalogAnime]) -> CliResult {
        if self.json {
            print::json(&items)?;
        } else if items.is_empty() {
            println!("{}", feedback::NO_RESULTS);
        } else {
            print::anime_table(items);
        }
        Ok(())
    }
}

/// Print what the board says about a mutation. Anything but success
/// becomes the command's error.
fn report(board: &MessageBoard<MalId>, outcome: MutationOutcome) -> CliResult {
    let text = board.snapshot().into_values().collect::<Vec<_>>().join("\n");
    board.shutdown();
    match outcome {
        MutationOutcome::Applied => {
            println!("{text}");
            Ok(())
        }
        _ => Err(text.into()),
    }
}
