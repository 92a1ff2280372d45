use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vidgen_client::api::ApiClient;
use vidgen_client::poller::Poller;
use vidgen_client::schemas::task::TaskOutcome;
use vidgen_client::schemas::task_status::TaskStatus;
use vidgen_client::session::{Session, SessionStatus};
use vidgen_client::settings::Settings;
use vidgen_client::store::AppStore;
use vidgen_client::submit::submit_generation;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();

    let settings = Settings::new()?;
    let api = ApiClient::new(&settings.api_url);
    let session = Session::new(api.clone());
    let store = AppStore::new();

    sign_in(&session, &settings).await?;
    wait_for_approval(&session, &settings).await?;

    match api.credit_balance().await {
        Ok(credits) => {
            store.set_credits(Some(credits));
            info!("Remaining credits: {}", credits);
        }
        Err(e) => warn!("Failed to load credit balance: {}", e),
    }

    if let Some(job) = &settings.job {
        store.update_form(|form| {
            form.image_url = Some(job.image_url.clone());
            form.product_name = job.product_name.clone();
            form.highlight = job.highlight.clone();
        });
        match submit_generation(&api, session.status(), &store).await {
            Ok(task_ids) => info!("Submitted tasks: {}", task_ids.join(", ")),
            Err(e) => {
                error!("Failed to submit generation job: {}", e);
                return Err(e.into());
            }
        }
    }

    let rejected = session.clone();
    let client = Arc::new(api.clone());
    let poller = Poller::builder(client.clone(), client, store.clone(), session.subscribe())
        .interval(settings.poll_interval())
        .on_session_rejected(move |e| rejected.handle_rejection(e))
        .build();
    let _handle = poller.start();

    let mut changes = store.subscribe_changes();
    let mut session_rx = session.subscribe();
    let mut seen: HashMap<String, TaskStatus> = HashMap::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            changed = session_rx.changed() => {
                let status = match changed {
                    Ok(()) => *session_rx.borrow_and_update(),
                    Err(_) => SessionStatus::Anonymous,
                };
                match status {
                    SessionStatus::Anonymous => {
                        error!("Session expired; sign in again");
                        return Err("session expired".into());
                    }
                    SessionStatus::PendingApproval => {
                        wait_for_approval(&session, &settings).await?;
                    }
                    SessionStatus::Approved => {}
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                report(&store, &mut seen);
                if !store.has_active_tasks() {
                    info!(
                        credits = ?store.credits(),
                        "All tasks settled"
                    );
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn sign_in(
    session: &Session,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(token) = settings.token.clone() {
        match session.restore(token).await {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                return Ok(());
            }
            Err(e) => warn!("Saved session rejected: {}", e),
        }
    }

    match settings.id_token.as_deref() {
        Some(id_token) => {
            let user = session.login(id_token).await?;
            info!("Signed in as {}", user.email);
            Ok(())
        }
        None => Err("no session: set VIDGEN_TOKEN or VIDGEN_ID_TOKEN".into()),
    }
}

async fn wait_for_approval(
    session: &Session,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    while session.status() == SessionStatus::PendingApproval {
        info!("Account pending approval, checking again in {:?}", settings.poll_interval());
        tokio::time::sleep(settings.poll_interval()).await;
        session.refresh_user().await?;
    }
    Ok(())
}

fn report(store: &AppStore, seen: &mut HashMap<String, TaskStatus>) {
    for task in store.tasks() {
        let previous = seen.insert(task.id.clone(), task.status);
        if previous == Some(task.status) && task.progress().is_none() {
            continue;
        }
        match task.outcome() {
            TaskOutcome::Pending => match task.progress() {
                Some(progress) => info!("Task {} {} {}%", task.id, task.status, progress),
                None => info!("Task {} {}", task.id, task.status),
            },
            TaskOutcome::Succeeded { video_url, .. } => {
                info!("Task {} completed: {}", task.id, video_url)
            }
            TaskOutcome::Failed(reason) => error!("Task {} failed: {}", task.id, reason),
        }
    }
}
