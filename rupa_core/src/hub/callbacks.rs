use crate::callback_data::CallbackData;
use crate::error::{RupaError, RupaResult};
use crate::files::kind::available_actions;
use crate::gateway::MessageRef;
use crate::hub::{back_to_menu, Hub, UserCtx};
use crate::merge::batch::Direction;
use crate::merge::RemoveOutcome;
use crate::selection::Service;
use crate::transform::Action;

const MERGED_FILE_NAME: &str = "merged.pdf";

impl Hub {
    /// Handles a button press. Returns a short text for the callback answer
    /// when the press was rejected.
    pub async fn handle_callback(
        &self,
        ctx: UserCtx,
        origin: Option<MessageRef>,
        payload: &str,
    ) -> RupaResult<Option<&'static str>> {
        let texts = ctx.texts();
        let data = match payload.parse::<CallbackData>() {
            Ok(data) => data,
            Err(e) => {
                log::warn!("User {} sent {}", ctx.user_id, e);
                return Ok(Some(texts.invalid_action));
            }
        };

        let _guard = self.lock_user(ctx.user_id).await;
        self.inactivity.touch(ctx.user_id, ctx.chat, ctx.lang);

        match data {
            CallbackData::StartBot => {
                self.restart(ctx).await?;
                Ok(None)
            }
            CallbackData::MainMenu => {
                self.selection.clear(ctx.user_id);
                self.sessions.abandon(ctx.user_id).await;
                self.merges.cancel(ctx.user_id);
                self.show_main_menu(ctx, origin).await?;
                Ok(None)
            }
            CallbackData::Service(service) => {
                self.choose_service(ctx, origin, service).await?;
                Ok(None)
            }
            CallbackData::Action { action, record_id } => {
                self.run_action(ctx, action, record_id).await
            }
            CallbackData::YesMore => {
                self.replace_or_send(ctx.chat, origin, texts.ready_next, None)
                    .await?;
                Ok(None)
            }
            CallbackData::NoThanks => {
                self.selection.clear(ctx.user_id);
                self.replace_or_send(ctx.chat, origin, texts.goodbye, None)
                    .await?;
                Ok(None)
            }
            CallbackData::MergeMove { index, direction } => {
                self.move_entry(ctx, index, direction).await
            }
            CallbackData::MergeRemove { index } => self.remove_entry(ctx, index).await,
            CallbackData::ExecuteMerge => self.run_merge(ctx).await,
            CallbackData::CancelMerge => {
                let Some(cancelled) = self.merges.cancel(ctx.user_id) else {
                    return Ok(Some(texts.invalid_action));
                };
                self.selection.clear(ctx.user_id);
                let keyboard = vec![back_to_menu(texts)];
                self.replace_or_send(
                    ctx.chat,
                    origin.or(cancelled.prompt_message),
                    texts.merge_cancelled,
                    Some(keyboard),
                )
                .await?;
                Ok(None)
            }
        }
    }

    async fn choose_service(
        &self,
        ctx: UserCtx,
        origin: Option<MessageRef>,
        service: Service,
    ) -> RupaResult<()> {
        let texts = ctx.texts();
        self.selection.select(ctx.user_id, service);
        let keyboard = vec![back_to_menu(texts)];

        if service == Service::MergePdf {
            self.sessions.abandon(ctx.user_id).await;
            self.merges.create(ctx.user_id, ctx.chat, ctx.lang);
            let text = texts
                .merge_intro
                .replace("{max}", &self.merges.capacity().to_string());
            return self.replace_or_send(ctx.chat, origin, &text, Some(keyboard)).await;
        }

        // Leaving a merge for another service drops the batch.
        self.merges.cancel(ctx.user_id);
        self.replace_or_send(ctx.chat, origin, texts.send_file, Some(keyboard))
            .await
    }

    async fn run_action(
        &self,
        ctx: UserCtx,
        action: Action,
        record_id: u64,
    ) -> RupaResult<Option<&'static str>> {
        let texts = ctx.texts();
        let record = match self.files.records().get(record_id)? {
            Some(record) if record.user_id == ctx.user_id => record,
            Some(_) => return Ok(Some(texts.invalid_action)),
            None => {
                self.sessions.cancel(ctx.user_id).await;
                self.report_error(ctx, &RupaError::RecordNotFound(record_id))
                    .await;
                return Ok(None);
            }
        };
        if !available_actions(&record.original_name, None).contains(&action) {
            return Ok(Some(texts.invalid_action));
        }

        // The file now belongs to this flow.
        self.sessions.cancel(ctx.user_id).await;
        let status = self
            .messenger
            .send_message(ctx.chat, texts.processing, None)
            .await?;

        let result = self.transform_and_send(ctx, action, record_id).await;
        self.files.discard_quietly(record_id);
        if let Err(e) = self.messenger.delete_message(ctx.chat, status).await {
            log::debug!("Failed to delete status for user {}: {}", ctx.user_id, e);
        }

        match result {
            Ok(()) => {
                log::info!("User {} ran {:?} on record {}", ctx.user_id, action, record_id);
                self.send_completion(ctx).await?;
            }
            Err(e) => self.report_error(ctx, &e).await,
        }
        Ok(None)
    }

    async fn transform_and_send(
        &self,
        ctx: UserCtx,
        action: Action,
        record_id: u64,
    ) -> RupaResult<()> {
        let (record, bytes) = self.files.open(record_id)?;
        let output = self
            .transformer
            .apply(action, &record.original_name, bytes)
            .await?;
        self.messenger
            .send_document(ctx.chat, &output.file_name, output.bytes)
            .await?;
        Ok(())
    }

    async fn move_entry(
        &self,
        ctx: UserCtx,
        index: usize,
        direction: Direction,
    ) -> RupaResult<Option<&'static str>> {
        match self.merges.reorder(ctx.user_id, index, direction).await {
            Ok(_) => Ok(None),
            Err(RupaError::SessionNotFound(_)) => Ok(Some(ctx.texts().invalid_action)),
            Err(e) => Err(e),
        }
    }

    async fn remove_entry(&self, ctx: UserCtx, index: usize) -> RupaResult<Option<&'static str>> {
        let texts = ctx.texts();
        let prompt = self
            .merges
            .snapshot(ctx.user_id)
            .and_then(|b| b.prompt_message);
        match self.merges.remove(ctx.user_id, index).await {
            Ok(RemoveOutcome::BatchCancelled) => {
                self.selection.clear(ctx.user_id);
                let keyboard = vec![back_to_menu(texts)];
                self.replace_or_send(ctx.chat, prompt, texts.merge_cancelled, Some(keyboard))
                    .await?;
                Ok(None)
            }
            Ok(RemoveOutcome::Removed { .. }) => Ok(None),
            Ok(RemoveOutcome::Unchanged) | Err(RupaError::SessionNotFound(_)) => {
                Ok(Some(texts.invalid_action))
            }
            Err(e) => Err(e),
        }
    }

    async fn run_merge(&self, ctx: UserCtx) -> RupaResult<Option<&'static str>> {
        let texts = ctx.texts();
        let status = self
            .messenger
            .send_message(ctx.chat, texts.merging, None)
            .await?;
        let result = self
            .merges
            .execute(ctx.user_id, self.transformer.as_ref())
            .await;
        if let Err(e) = self.messenger.delete_message(ctx.chat, status).await {
            log::debug!("Failed to delete status for user {}: {}", ctx.user_id, e);
        }

        match result {
            Ok(merged) => {
                // The batch is gone at this point, so a failed send ends the flow.
                if let Err(e) = self
                    .messenger
                    .send_document(ctx.chat, MERGED_FILE_NAME, merged)
                    .await
                {
                    self.selection.clear(ctx.user_id);
                    self.report_error(ctx, &e).await;
                    return Ok(None);
                }
                self.send_completion(ctx).await?;
                Ok(None)
            }
            Err(RupaError::SessionNotFound(_)) => Ok(Some(texts.invalid_action)),
            Err(e @ RupaError::InsufficientFiles(_)) => {
                self.report_error(ctx, &e).await;
                Ok(None)
            }
            Err(RupaError::BatchTimedOut(_)) => {
                // The expiry sweep already told the user.
                log::info!("Merge for user {} finished after its batch expired", ctx.user_id);
                Ok(None)
            }
            Err(e) => {
                self.merges.cancel(ctx.user_id);
                self.selection.clear(ctx.user_id);
                self.report_error(ctx, &e).await;
                Ok(None)
            }
        }
    }
}

