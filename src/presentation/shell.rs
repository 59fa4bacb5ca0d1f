//! Line-oriented interactive client over the store, the edit session and the composer.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::debug;

use crate::application::composer::PostComposer;
use crate::application::session::{DraftField, EditSession};
use crate::application::store::{CollectionStore, ReloadOutcome};
use crate::domain::posts::{PostFields, PostId};

use super::views::{render_collection, render_session};

pub const HELP: &str = "\
Commands:
  list                              show the collection
  reload                            fetch the collection again
  new <author> | <content> [| <image>]
                                    create a post
  edit <id>                         start editing a post
  set <author|content|image> <text> change a field of the draft
  show                              show the draft
  save                              send the draft
  cancel                            drop the draft
  delete <id>                       delete a post (asks first)
  help                              show this text
  quit                              leave";

/// Whether the caller should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<W> {
    store: Arc<CollectionStore>,
    session: EditSession,
    composer: PostComposer,
    pending_delete: Option<PostId>,
    out: W,
}

impl<W: Write> Shell<W> {
    pub fn new(store: Arc<CollectionStore>, composer: PostComposer, out: W) -> Self {
        let session = EditSession::new(Arc::clone(&store));
        Self {
            store,
            session,
            composer,
            pending_delete: None,
            out,
        }
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        let prompt = if self.pending_delete.is_some() {
            ""
        } else {
            "> "
        };
        write!(self.out, "{prompt}")?;
        self.out.flush()
    }

    pub fn render_collection(&mut self) -> io::Result<()> {
        let rendered = render_collection(&self.store.state());
        writeln!(self.out, "{rendered}")
    }

    /// Re-draw the list after a change that did not come from the current command.
    pub fn refresh_view(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.render_collection()
    }

    /// Handle one line of input.
    pub async fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();

        if let Some(id) = self.pending_delete.take() {
            return self.confirm_delete(id, line).await.map(|()| Flow::Continue);
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        debug!(command, "Shell command");

        match command.to_ascii_lowercase().as_str() {
            "" => {}
            "help" | "?" => writeln!(self.out, "{HELP}")?,
            "list" | "ls" => self.render_collection()?,
            "reload" => self.reload().await?,
            "new" => self.create(rest).await?,
            "edit" => self.edit(rest)?,
            "set" => self.set(rest)?,
            "show" => self.show()?,
            "save" => self.save().await?,
            "cancel" => match self.session.cancel() {
                Ok(()) => writeln!(self.out, "Edit cancelled.")?,
                Err(err) => writeln!(self.out, "Cannot cancel: {err}")?,
            },
            "delete" | "rm" => {
                if rest.is_empty() {
                    writeln!(self.out, "Usage: delete <id>")?;
                } else {
                    self.pending_delete = Some(PostId::from(rest));
                    writeln!(self.out, "Delete this post? [y/N]")?;
                }
            }
            "quit" | "exit" => {
                self.session.close();
                return Ok(Flow::Quit);
            }
            other => writeln!(
                self.out,
                "Unknown command `{other}`. Type `help` for a list of commands."
            )?,
        }
        Ok(Flow::Continue)
    }

    async fn reload(&mut self) -> io::Result<()> {
        match self.store.reload().await {
            ReloadOutcome::Applied { count } => writeln!(self.out, "Loaded {count} posts."),
            ReloadOutcome::Failed(err) => writeln!(self.out, "Failed to fetch posts: {err}"),
            ReloadOutcome::Superseded => Ok(()),
        }
    }

    async fn create(&mut self, rest: &str) -> io::Result<()> {
        let mut parts = rest.splitn(3, '|').map(str::trim);
        let author = parts.next().unwrap_or_default();
        let Some(content) = parts.next() else {
            return writeln!(self.out, "Usage: new <author> | <content> [| <image>]");
        };
        let mut fields = PostFields::new(author, content);
        if let Some(image) = parts.next() {
            fields = fields.with_image_url(image);
        }

        match self.composer.publish(fields).await {
            Ok(post) => writeln!(self.out, "Created post #{}.", post.id),
            Err(err) => writeln!(self.out, "Failed to create post: {err}"),
        }
    }

    fn edit(&mut self, rest: &str) -> io::Result<()> {
        if rest.is_empty() {
            return writeln!(self.out, "Usage: edit <id>");
        }
        let id = PostId::from(rest);
        let Some(post) = self.store.find(&id) else {
            return writeln!(self.out, "No post with id `{id}`.");
        };

        match self.session.begin_edit(post) {
            Ok(view) => writeln!(self.out, "{}", render_session(&view)),
            Err(err) => writeln!(self.out, "Cannot edit post: {err}"),
        }
    }

    fn set(&mut self, rest: &str) -> io::Result<()> {
        let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let field = match name.parse::<DraftField>() {
            Ok(field) => field,
            Err(err) => return writeln!(self.out, "{err}"),
        };

        match self.session.set_draft_field(field, value.trim()) {
            Ok(()) => self.show(),
            Err(err) => writeln!(self.out, "Cannot change draft: {err}"),
        }
    }

    fn show(&mut self) -> io::Result<()> {
        match self.session.view() {
            Some(view) => writeln!(self.out, "{}", render_session(&view)),
            None => writeln!(self.out, "Not editing any post. Use `edit <id>` first."),
        }
    }

    async fn save(&mut self) -> io::Result<()> {
        match self.session.submit().await {
            Ok(post) => writeln!(self.out, "Saved post #{}.", post.id),
            Err(err) => writeln!(self.out, "Failed to update post: {err}"),
        }
    }

    async fn confirm_delete(&mut self, id: PostId, answer: &str) -> io::Result<()> {
        if !matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
            return writeln!(self.out, "Delete cancelled.");
        }
        match self.store.delete(&id).await {
            Ok(()) => writeln!(self.out, "Deleted post #{id}."),
            Err(err) => writeln!(self.out, "Failed to delete: {err}"),
        }
    }
}
