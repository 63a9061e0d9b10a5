use crate::callback_data::CallbackData;
use crate::error::{RupaError, RupaResult};
use crate::files::kind::{available_actions, classify};
use crate::files::records::FileRecord;
use crate::gateway::Button;
use crate::hub::{back_to_menu, Hub, IncomingFile, UserCtx};
use crate::selection::Service;

impl Hub {
    /// Routes an upload to the open merge batch or to a new processing
    /// session. Nothing is persisted for a rejected upload.
    pub async fn handle_upload(&self, ctx: UserCtx, file: IncomingFile) -> RupaResult<()> {
        let _guard = self.lock_user(ctx.user_id).await;
        self.inactivity.touch(ctx.user_id, ctx.chat, ctx.lang);

        let limit = self.config.storage.max_file_size;
        if file.size > limit {
            self.report_error(ctx, &RupaError::FileTooLarge { size: file.size, limit })
                .await;
            return Ok(());
        }

        let service = self.selection.get(ctx.user_id);
        if service == Some(Service::MergePdf) || self.merges.has_batch(ctx.user_id) {
            return self.add_to_batch(ctx, file).await;
        }

        let (kind, ext) = classify(&file.name);
        if let Some(service) = service {
            if !service.accepts(kind, &ext) {
                self.report_error(ctx, &RupaError::WrongFileType(file.name)).await;
                return Ok(());
            }
        }
        let actions = available_actions(&file.name, service);
        if actions.is_empty() {
            self.report_error(ctx, &RupaError::WrongFileType(file.name)).await;
            return Ok(());
        }

        let record = match self.fetch_and_store(ctx, &file).await {
            Ok(record) => record,
            Err(e) => {
                self.report_error(ctx, &e).await;
                return Ok(());
            }
        };

        let texts = ctx.texts();
        let mut keyboard: Vec<Vec<Button>> = actions
            .into_iter()
            .map(|action| {
                vec![Button::new(
                    action.label(texts),
                    CallbackData::Action {
                        action,
                        record_id: record.id,
                    },
                )]
            })
            .collect();
        keyboard.push(back_to_menu(texts));

        let text = texts.file_received.replace("{name}", &record.original_name);
        if let Err(e) = self
            .messenger
            .send_message(ctx.chat, &text, Some(keyboard))
            .await
        {
            // Without a menu the file is unreachable.
            self.files.discard_quietly(record.id);
            return Err(e);
        }
        self.sessions.start(ctx.chat, &record, ctx.lang).await;
        Ok(())
    }

    async fn add_to_batch(&self, ctx: UserCtx, file: IncomingFile) -> RupaResult<()> {
        let (_, ext) = classify(&file.name);
        if ext != "pdf" {
            self.report_error(ctx, &RupaError::WrongFileType(file.name)).await;
            return Ok(());
        }

        match self.merges.snapshot(ctx.user_id) {
            Some(batch) if batch.record_ids.len() >= self.merges.capacity() => {
                self.report_error(ctx, &RupaError::BatchFull(batch.record_ids.len()))
                    .await;
                return Ok(());
            }
            Some(_) => {}
            // The batch expired or was cancelled while the selection stayed.
            None => self.merges.create(ctx.user_id, ctx.chat, ctx.lang),
        }

        let record = match self.fetch_and_store(ctx, &file).await {
            Ok(record) => record,
            Err(e) => {
                self.report_error(ctx, &e).await;
                return Ok(());
            }
        };

        match self.merges.add_document(ctx.user_id, record.id) {
            Ok(count) => {
                let text = ctx
                    .texts()
                    .merge_added
                    .replace("{count}", &count.to_string());
                self.messenger.send_message(ctx.chat, &text, None).await?;
                Ok(())
            }
            Err(e) => {
                self.files.discard_quietly(record.id);
                self.report_error(ctx, &e).await;
                Ok(())
            }
        }
    }

    async fn fetch_and_store(
        &self,
        ctx: UserCtx,
        file: &IncomingFile,
    ) -> RupaResult<FileRecord> {
        let bytes = self.messenger.download_file(&file.file_id).await?;
        let limit = self.config.storage.max_file_size;
        if bytes.len() as u64 > limit {
            return Err(RupaError::FileTooLarge {
                size: bytes.len() as u64,
                limit,
            });
        }
        self.files
            .persist(ctx.user_id, &file.file_id, &file.name, &bytes)
    }
}
