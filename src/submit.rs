use crate::api::ApiClient;
use crate::error::SubmitError;
use crate::schemas::task::VideoTask;
use crate::session::SessionStatus;
use crate::store::AppStore;
use tracing::{info, warn};

/// Submits the store's current form as a generation job.
///
/// Each accepted task id is appended to the queue as an optimistic `pending`
/// task. Errors are returned for the caller to show; nothing is retried.
pub async fn submit_generation(
    api: &ApiClient,
    session: SessionStatus,
    store: &AppStore,
) -> Result<Vec<String>, SubmitError> {
    if store.is_generating() {
        return Err(SubmitError::AlreadyGenerating);
    }
    let form = store.form();
    let request = form.to_request().map_err(SubmitError::InvalidForm)?;
    if !session.is_approved() {
        return Err(SubmitError::NotApproved);
    }
    if store.set_generating(true) {
        return Err(SubmitError::AlreadyGenerating);
    }

    let result = api.generate_task(&request).await;
    store.set_generating(false);

    match result {
        Ok(task_ids) => {
            for id in &task_ids {
                store.append(VideoTask::pending(id.as_str()));
            }
            info!(
                count = task_ids.len(),
                style = ?form.style,
                "generation job submitted"
            );
            Ok(task_ids)
        }
        Err(e) => {
            warn!("generation submit failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_before_any_request() {
        // Nothing listens on this port; a request would surface as a transport error.
        let api = ApiClient::new("http://127.0.0.1:9");
        let store = AppStore::new();

        let err = submit_generation(&api, SessionStatus::Approved, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidForm(_)));

        store.update_form(|form| {
            form.image_url = Some("https://img.host/p.png".into());
            form.product_name = "Serum".into();
            form.highlight = "glow".into();
        });
        let err = submit_generation(&api, SessionStatus::PendingApproval, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::NotApproved));

        store.set_generating(true);
        let err = submit_generation(&api, SessionStatus::Approved, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::AlreadyGenerating));
        assert!(store.tasks().is_empty());
    }
}
