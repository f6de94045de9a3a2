//! Conversations, members and messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use std::str::FromStr;

use super::{new_id, parsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Support,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::Support => "support",
        }
    }
}

impl FromStr for ConversationKind {
    type Err = mta_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ConversationKind::Direct),
            "support" => Ok(ConversationKind::Support),
            other => Err(mta_common::Error::InvalidInput(format!("Unknown conversation kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    /// Student who opened a support conversation
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, SqliteRow> for Conversation {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            kind: parsed(row, "kind")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            last_message_at: row.try_get("last_message_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Message {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            sender_id: row.try_get("sender_id")?,
            sender_name: row.try_get("sender_name")?,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Message {
    pub fn payload(&self) -> mta_common::events::MessagePayload {
        mta_common::events::MessagePayload {
            id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender_id: self.sender_id.clone(),
            sender_name: self.sender_name.clone(),
            body: self.body.clone(),
            created_at: self.created_at,
        }
    }
}

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.conversation_id, m.sender_id, u.display_name AS sender_name, m.body, m.created_at
    FROM messages m
    JOIN users u ON u.id = m.sender_id
"#;

/// Key identifying the direct conversation between two users, order-independent
pub fn direct_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}:{}", a, b)
    } else {
        format!("{}:{}", b, a)
    }
}

pub fn support_key(user_id: &str) -> String {
    format!("support:{}", user_id)
}

pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Conversation>> {
    sqlx::query_as("SELECT * FROM conversations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

async fn find_by_key(pool: &SqlitePool, key: &str) -> sqlx::Result<Option<Conversation>> {
    sqlx::query_as("SELECT * FROM conversations WHERE direct_key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
}

/// Insert a conversation and its members in one transaction
///
/// A concurrent creator of the same key wins the UNIQUE constraint; the
/// loser then finds the existing row.
async fn get_or_create(
    pool: &SqlitePool,
    kind: ConversationKind,
    key: &str,
    owner_id: Option<&str>,
    members: &[String],
) -> sqlx::Result<(Conversation, bool)> {
    if let Some(existing) = find_by_key(pool, key).await? {
        return Ok((existing, false));
    }

    let id = new_id();
    let now = mta_common::time::now();
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO conversations (id, kind, direct_key, owner_id, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(kind.as_str())
    .bind(key)
    .bind(owner_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        let existing = find_by_key(pool, key).await?.ok_or(sqlx::Error::RowNotFound)?;
        return Ok((existing, false));
    }

    for member in members {
        sqlx::query(
            "INSERT OR IGNORE INTO conversation_members (conversation_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(&id)
        .bind(member)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    let created = get(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)?;
    Ok((created, true))
}

/// Direct conversation between `a` and `b`; `true` when newly created
pub async fn get_or_create_direct(pool: &SqlitePool, a: &str, b: &str) -> sqlx::Result<(Conversation, bool)> {
    let members = vec![a.to_string(), b.to_string()];
    get_or_create(pool, ConversationKind::Direct, &direct_key(a, b), None, &members).await
}

/// Support conversation of `user_id`, with every current admin as member
///
/// Admins promoted after creation are added on the next call.
pub async fn get_or_create_support(
    pool: &SqlitePool,
    user_id: &str,
    admin_ids: &[String],
) -> sqlx::Result<(Conversation, bool)> {
    let mut members = vec![user_id.to_string()];
    members.extend(admin_ids.iter().cloned());
    let (conversation, created) = get_or_create(
        pool,
        ConversationKind::Support,
        &support_key(user_id),
        Some(user_id),
        &members,
    )
    .await?;

    if !created {
        let now = mta_common::time::now();
        for admin_id in admin_ids {
            add_member(pool, &conversation.id, admin_id, now).await?;
        }
    }
    Ok((conversation, created))
}

async fn add_member(pool: &SqlitePool, conversation_id: &str, user_id: &str, now: DateTime<Utc>) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO conversation_members (conversation_id, user_id, joined_at) VALUES (?, ?, ?)",
    )
    .bind(conversation_id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn is_member(pool: &SqlitePool, conversation_id: &str, user_id: &str) -> sqlx::Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversation_members WHERE conversation_id = ? AND user_id = ?",
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn member_ids(pool: &SqlitePool, conversation_id: &str) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT user_id FROM conversation_members WHERE conversation_id = ? ORDER BY joined_at")
        .bind(conversation_id)
        .fetch_all(pool)
        .await
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub members: Vec<MemberInfo>,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    pub user_id: String,
    pub display_name: String,
    pub last_read_at: Option<DateTime<Utc>>,
}

/// Conversations of `user_id`, most recently active first
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<ConversationSummary>> {
    let conversations: Vec<Conversation> = sqlx::query_as(
        r#"
        SELECT c.* FROM conversations c
        JOIN conversation_members cm ON cm.conversation_id = c.id
        WHERE cm.user_id = ?
        ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let members = members(pool, &conversation.id).await?;
        let last_message = messages(pool, &conversation.id, None, 1).await?.into_iter().next();
        let unread_count = unread_count(pool, &conversation.id, user_id).await?;
        summaries.push(ConversationSummary {
            conversation,
            members,
            last_message,
            unread_count,
        });
    }
    Ok(summaries)
}

pub async fn members(pool: &SqlitePool, conversation_id: &str) -> sqlx::Result<Vec<MemberInfo>> {
    let rows = sqlx::query(
        r#"
        SELECT cm.user_id, u.display_name, cm.last_read_at
        FROM conversation_members cm
        JOIN users u ON u.id = cm.user_id
        WHERE cm.conversation_id = ?
        ORDER BY cm.joined_at
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(MemberInfo {
                user_id: row.try_get("user_id")?,
                display_name: row.try_get("display_name")?,
                last_read_at: row.try_get("last_read_at")?,
            })
        })
        .collect()
}

/// Messages from others newer than the member's `last_read_at`
pub async fn unread_count(pool: &SqlitePool, conversation_id: &str, user_id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM messages m
        JOIN conversation_members cm ON cm.conversation_id = m.conversation_id AND cm.user_id = ?
        WHERE m.conversation_id = ?
          AND m.sender_id != ?
          AND m.created_at > COALESCE(cm.last_read_at, '')
        "#,
    )
    .bind(user_id)
    .bind(conversation_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Newest first, strictly older than `before` when given
pub async fn messages(
    pool: &SqlitePool,
    conversation_id: &str,
    before: Option<DateTime<Utc>>,
    limit: i64,
) -> sqlx::Result<Vec<Message>> {
    let sql = format!(
        "{} WHERE m.conversation_id = ? AND (? IS NULL OR m.created_at < ?) ORDER BY m.created_at DESC, m.id DESC LIMIT ?",
        MESSAGE_SELECT
    );
    sqlx::query_as(&sql)
        .bind(conversation_id)
        .bind(before)
        .bind(before)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Persist a message and bump the conversation's activity time
pub async fn insert_message(
    pool: &SqlitePool,
    conversation_id: &str,
    sender_id: &str,
    body: &str,
) -> sqlx::Result<Message> {
    let id = new_id();
    let now = mta_common::time::now();
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO messages (id, conversation_id, sender_id, body, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(conversation_id)
        .bind(sender_id)
        .bind(body)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE conversations SET last_message_at = ? WHERE id = ?")
        .bind(now)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

    let sql = format!("{} WHERE m.id = ?", MESSAGE_SELECT);
    let message: Message = sqlx::query_as(&sql).bind(&id).fetch_one(&mut *tx).await?;

    tx.commit().await?;
    Ok(message)
}

/// Returns the read time, `None` when not a member
pub async fn mark_read(
    pool: &SqlitePool,
    conversation_id: &str,
    user_id: &str,
) -> sqlx::Result<Option<DateTime<Utc>>> {
    let now = mta_common::time::now();
    let result = sqlx::query(
        "UPDATE conversation_members SET last_read_at = ? WHERE conversation_id = ? AND user_id = ?",
    )
    .bind(now)
    .bind(conversation_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok((result.rows_affected() > 0).then_some(now))
}
