//! GitHub issue comments as a comment thread.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use octocrab::{
    Octocrab,
    models::{
        issues::Comment as ApiComment,
        reactions::{Reaction, ReactionContent},
    },
};
use tracing::{debug, instrument, warn};

use crate::{
    comment::{
        ActorId, Author, Capabilities, Comment, CommentId, CommentMutations, Emoji,
        MutationError,
        mutation::{CommentEdit, EditedComment, MutationResult, NewReaction, ReactionId},
    },
    errors::AppError,
    thread::{LoadedThread, ThreadEntry, ThreadSource},
};

/// Number of reaction listings fetched concurrently while loading.
const REACTION_FETCHES: usize = 8;

pub struct GithubClient {
    inner: Octocrab,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Result<Self, AppError> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        Ok(Self {
            inner: builder.build()?,
        })
    }

    pub fn inner(&self) -> &Octocrab {
        &self.inner
    }

    pub async fn current_user(&self) -> Result<String, AppError> {
        Ok(self.inner.current().user().await?.login)
    }
}

/// One issue conversation, read and mutated through the REST API.
pub struct GithubThread {
    client: GithubClient,
    owner: String,
    repo: String,
    number: u64,
    viewer: String,
}

impl GithubThread {
    pub fn new(
        client: GithubClient,
        owner: impl Into<String>,
        repo: impl Into<String>,
        number: u64,
        viewer: impl Into<String>,
    ) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
            number,
            viewer: viewer.into(),
        }
    }

    fn handler(&self) -> octocrab::issues::IssueHandler<'_> {
        self.client.inner().issues(&self.owner, &self.repo)
    }

    fn capabilities_for(&self, author: &str) -> Capabilities {
        let own = author.eq_ignore_ascii_case(&self.viewer);
        Capabilities {
            can_edit: own,
            can_delete: own || self.owner.eq_ignore_ascii_case(&self.viewer),
        }
    }

    fn into_comment(api: ApiComment, snapshot: ReactionSnapshot) -> Comment {
        let (reactions, reaction_ids) = snapshot;
        Comment {
            id: CommentId::from(api.id.0),
            body: api.body.unwrap_or_default(),
            author: Author {
                id: ActorId::new(&api.user.login),
                name: api.user.login,
            },
            created_at: api.created_at,
            reactions,
            reaction_ids,
            is_conversation_root: false,
        }
    }

    /// Every reaction on one comment, across all pages.
    async fn comment_reactions(&self, id: u64) -> octocrab::Result<Vec<Reaction>> {
        let first = self
            .handler()
            .list_comment_reactions(id)
            .per_page(100u8)
            .send()
            .await?;
        self.client.inner().all_pages(first).await
    }
}

type ReactionSnapshot = (HashMap<Emoji, u64>, HashSet<ReactionId>);

/// Counts per emoji plus the ids behind them. Reactions outside the palette
/// are skipped.
fn reaction_snapshot<'a>(
    reactions: impl IntoIterator<Item = (String, &'a ReactionContent)>,
) -> ReactionSnapshot {
    let mut counts = HashMap::new();
    let mut ids = HashSet::new();
    for (id, content) in reactions {
        if let Some(emoji) = emoji_for(content) {
            *counts.entry(emoji).or_insert(0_u64) += 1;
            ids.insert(ReactionId(id));
        }
    }
    (counts, ids)
}

fn api_id(id: &CommentId) -> MutationResult<u64> {
    id.as_str().parse().map_err(|_| MutationError::NotFound)
}

pub fn reaction_content(emoji: Emoji) -> ReactionContent {
    match emoji {
        Emoji::ThumbsUp => ReactionContent::PlusOne,
        Emoji::ThumbsDown => ReactionContent::MinusOne,
        Emoji::Grinning => ReactionContent::Laugh,
        Emoji::Party => ReactionContent::Hooray,
        Emoji::Confused => ReactionContent::Confused,
        Emoji::Heart => ReactionContent::Heart,
        Emoji::Rocket => ReactionContent::Rocket,
        Emoji::Eyes => ReactionContent::Eyes,
    }
}

pub fn emoji_for(content: &ReactionContent) -> Option<Emoji> {
    Some(match content {
        ReactionContent::PlusOne => Emoji::ThumbsUp,
        ReactionContent::MinusOne => Emoji::ThumbsDown,
        ReactionContent::Laugh => Emoji::Grinning,
        ReactionContent::Hooray => Emoji::Party,
        ReactionContent::Confused => Emoji::Confused,
        ReactionContent::Heart => Emoji::Heart,
        ReactionContent::Rocket => Emoji::Rocket,
        ReactionContent::Eyes => Emoji::Eyes,
        #[allow(unreachable_patterns)]
        _ => return None,
    })
}

/// Maps a failed API call onto the error kinds the controller reacts to.
pub fn classify(err: octocrab::Error) -> MutationError {
    match &err {
        octocrab::Error::GitHub { source, .. } => match source.status_code.as_u16() {
            404 | 410 => MutationError::NotFound,
            401 | 403 => MutationError::Permission(source.message.clone()),
            400 | 422 => MutationError::Validation(source.message.clone()),
            _ => MutationError::Network(source.message.clone()),
        },
        _ => MutationError::Network(err.to_string().replace('\n', " ")),
    }
}

#[async_trait]
impl ThreadSource for GithubThread {
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo, number = self.number))]
    async fn load_thread(&self) -> Result<LoadedThread, AppError> {
        let handler = self.handler();
        let issue = handler.get(self.number).await?;
        let first = handler
            .list_comments(self.number)
            .per_page(100u8)
            .send()
            .await?;
        let comments = self.client.inner().all_pages(first).await?;
        debug!(count = comments.len(), "loaded comments");

        let ids: Vec<u64> = comments.iter().map(|c| c.id.0).collect();
        let mut reactions = stream::iter(ids)
            .map(|id| async move {
                let snapshot = match self.comment_reactions(id).await {
                    Ok(list) => Some(reaction_snapshot(
                        list.iter().map(|r| (r.id.0.to_string(), &r.content)),
                    )),
                    Err(err) => {
                        warn!(comment = id, error = %err, "could not load reactions");
                        None
                    }
                };
                (id, snapshot)
            })
            .buffer_unordered(REACTION_FETCHES)
            .collect::<HashMap<_, _>>()
            .await;

        let entries = comments
            .into_iter()
            .map(|api| {
                let capabilities = self.capabilities_for(&api.user.login);
                let snapshot = reactions.remove(&api.id.0).flatten();
                let reactions_loaded = snapshot.is_some();
                ThreadEntry {
                    comment: Self::into_comment(api, snapshot.unwrap_or_default()),
                    capabilities,
                    reactions_loaded,
                }
            })
            .collect();

        Ok(LoadedThread {
            title: issue.title,
            viewer: ActorId::new(&self.viewer),
            entries,
        })
    }
}

#[async_trait]
impl CommentMutations for GithubThread {
    #[instrument(skip(self))]
    async fn create_reaction(&self, request: NewReaction) -> MutationResult<ReactionId> {
        let id = api_id(&request.comment_id)?;
        let reaction = self
            .handler()
            .create_comment_reaction(id, reaction_content(request.emoji))
            .await
            .map_err(classify)?;
        Ok(ReactionId(reaction.id.0.to_string()))
    }

    #[instrument(skip(self, request), fields(comment = %request.id))]
    async fn edit_comment(&self, request: CommentEdit) -> MutationResult<EditedComment> {
        let id = api_id(&request.id)?;
        let updated = self
            .handler()
            .update_comment(octocrab::models::CommentId(id), request.new_content)
            .await
            .map_err(classify)?;
        Ok(EditedComment {
            id: request.id,
            content: updated.body.unwrap_or_default(),
        })
    }

    #[instrument(skip(self))]
    async fn delete_comment(&self, id: CommentId) -> MutationResult<CommentId> {
        let api = api_id(&id)?;
        self.handler()
            .delete_comment(octocrab::models::CommentId(api))
            .await
            .map_err(classify)?;
        Ok(id)
    }
}
