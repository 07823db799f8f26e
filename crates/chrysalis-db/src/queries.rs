use crate::Database;
use crate::models::{
    AchievementRow, MeadowParticipantRow, MeadowRow, ProposalRow, ResourceRow, StageTransitionRow,
    UserAchievementRow, UserRow, VoteRow,
};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use chrysalis_types::models::{
    Achievement, Meadow, MeadowParticipant, Proposal, Resource, ResourceCategory, StageTransition,
    User, UserAchievement, Vote,
};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ts = now.to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, display_name, current_stage, stage_updated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'FLOWER', ?5, ?5)",
                rusqlite::params![id, username, password_hash, display_name, ts],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    pub fn get_user_row(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.get_user_row(id)?.map(UserRow::into_model).transpose()
    }

    // -- Proposals --

    pub fn insert_proposal(&self, proposal: &Proposal) -> Result<()> {
        let content = serde_json::to_string(&proposal.content)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO proposals
                   (id, title, description, content, vote_type, vote_status,
                    start_date, end_date, quorum, threshold, result, author_id, created_at, closed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?12, NULL)",
                rusqlite::params![
                    proposal.id.to_string(),
                    proposal.title,
                    proposal.description,
                    content,
                    proposal.vote_type.as_str(),
                    proposal.vote_status.as_str(),
                    proposal.start_date.map(|d| d.to_rfc3339()),
                    proposal.end_date.map(|d| d.to_rfc3339()),
                    proposal.quorum,
                    proposal.threshold,
                    proposal.author_id.to_string(),
                    proposal.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        self.with_conn(|conn| query_proposal(conn, id))?
            .map(ProposalRow::into_model)
            .transpose()
    }

    /// Full-row update for DRAFT edits; lifecycle fields move through
    /// the conditional setters below instead.
    pub fn update_proposal(&self, proposal: &Proposal) -> Result<()> {
        let content = serde_json::to_string(&proposal.content)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE proposals
                 SET title = ?2, description = ?3, content = ?4, vote_type = ?5,
                     end_date = ?6, quorum = ?7, threshold = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    proposal.id.to_string(),
                    proposal.title,
                    proposal.description,
                    content,
                    proposal.vote_type.as_str(),
                    proposal.end_date.map(|d| d.to_rfc3339()),
                    proposal.quorum,
                    proposal.threshold,
                ],
            )?;
            Ok(())
        })
    }

    /// Conditional DRAFT -> ACTIVE. Returns whether the row transitioned.
    pub fn set_voting_active(&self, id: &str, started_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE proposals SET vote_status = 'ACTIVE', start_date = ?2
                 WHERE id = ?1 AND vote_status = 'DRAFT'",
                rusqlite::params![id, started_at.to_rfc3339()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Conditional ACTIVE -> CLOSED writing the permanent result.
    pub fn set_voting_closed(
        &self,
        id: &str,
        closed_at: DateTime<Utc>,
        result_json: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE proposals SET vote_status = 'CLOSED', closed_at = ?2, result = ?3
                 WHERE id = ?1 AND vote_status = 'ACTIVE'",
                rusqlite::params![id, closed_at.to_rfc3339(), result_json],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn list_proposals(
        &self,
        vote_status: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Proposal>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description, content, vote_type, vote_status,
                        start_date, end_date, quorum, threshold, result, author_id, created_at, closed_at
                 FROM proposals
                 WHERE (?1 IS NULL OR vote_status = ?1)
                   AND (?2 IS NULL OR title LIKE ?3 OR description LIKE ?3)
                 ORDER BY created_at DESC",
            )?;
            let pattern = search.map(|s| format!("%{s}%"));
            let rows = stmt
                .query_map(
                    rusqlite::params![vote_status, search, pattern],
                    proposal_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(ProposalRow::into_model).collect()
    }

    pub fn count_votes(&self, proposal_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM votes WHERE proposal_id = ?1",
                [proposal_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Votes --

    pub fn upsert_vote(&self, vote: &Vote) -> Result<()> {
        let choice = serde_json::to_string(&vote.choice)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO votes (proposal_id, user_id, choice, cast_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (proposal_id, user_id)
                 DO UPDATE SET choice = excluded.choice, cast_at = excluded.cast_at",
                rusqlite::params![
                    vote.proposal_id.to_string(),
                    vote.user_id.to_string(),
                    choice,
                    vote.cast_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_votes_for_proposal(&self, proposal_id: &str) -> Result<Vec<Vote>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT proposal_id, user_id, choice, cast_at
                 FROM votes WHERE proposal_id = ?1",
            )?;
            let rows = stmt
                .query_map([proposal_id], |row| {
                    Ok(VoteRow {
                        proposal_id: row.get(0)?,
                        user_id: row.get(1)?,
                        choice: row.get(2)?,
                        cast_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(VoteRow::into_model).collect()
    }

    // -- Stage transitions --

    /// Appends the history row and moves the user's stage in one
    /// transaction; either both commit or neither does.
    pub fn record_stage_transition(&self, transition: &StageTransition) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO stage_transitions (id, user_id, from_stage, to_stage, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    transition.id.to_string(),
                    transition.user_id.to_string(),
                    transition.from_stage.as_str(),
                    transition.to_stage.as_str(),
                    transition.reason,
                    transition.created_at.to_rfc3339(),
                ],
            )?;
            let changed = tx.execute(
                "UPDATE users SET current_stage = ?2, stage_updated_at = ?3 WHERE id = ?1",
                rusqlite::params![
                    transition.user_id.to_string(),
                    transition.to_stage.as_str(),
                    transition.created_at.to_rfc3339(),
                ],
            )?;
            if changed == 0 {
                return Err(anyhow!("user {} missing mid-transition", transition.user_id));
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn stage_history(&self, user_id: &str) -> Result<Vec<StageTransition>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, from_stage, to_stage, reason, created_at
                 FROM stage_transitions WHERE user_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], transition_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter()
            .map(StageTransitionRow::into_model)
            .collect()
    }

    pub fn latest_stage_transition(&self, user_id: &str) -> Result<Option<StageTransition>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, from_stage, to_stage, reason, created_at
                 FROM stage_transitions WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT 1",
            )?;
            let row = stmt.query_row([user_id], transition_from_row).optional()?;
            Ok(row)
        })?
        .map(StageTransitionRow::into_model)
        .transpose()
    }

    // -- Participation counts --

    pub fn count_meadow_participations(&self, user_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM meadow_participants WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn count_participations_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM meadow_participants
                 WHERE user_id = ?1 AND created_at >= ?2",
                rusqlite::params![user_id, since.to_rfc3339()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn count_hosted_meadows(&self, user_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM meadows WHERE host_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn count_hosted_completed_meadows(&self, user_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM meadows WHERE host_id = ?1 AND status = 'COMPLETED'",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Achievements --

    /// Idempotent get-or-create keyed by the unique code. The caller's
    /// candidate id is only used when the row doesn't exist yet.
    pub fn ensure_achievement(
        &self,
        candidate_id: &str,
        code: &str,
        achievement_type: &str,
        title: &str,
        description: &str,
    ) -> Result<Achievement> {
        let row = self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO achievements (id, code, type, title, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![candidate_id, code, achievement_type, title, description],
            )?;
            let mut stmt = conn.prepare(
                "SELECT id, code, type, title, description FROM achievements WHERE code = ?1",
            )?;
            let row = stmt.query_row([code], achievement_from_row)?;
            Ok(row)
        })?;
        row.into_model()
    }

    pub fn get_user_achievement(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<Option<UserAchievement>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, achievement_id, progress, earned_at, seen_at, updated_at
                 FROM user_achievements WHERE user_id = ?1 AND achievement_id = ?2",
            )?;
            let row = stmt
                .query_row([user_id, achievement_id], user_achievement_from_row)
                .optional()?;
            Ok(row)
        })?
        .map(UserAchievementRow::into_model)
        .transpose()
    }

    pub fn upsert_user_achievement(&self, record: &UserAchievement) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_achievements
                   (user_id, achievement_id, progress, earned_at, seen_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (user_id, achievement_id)
                 DO UPDATE SET progress = excluded.progress,
                               earned_at = excluded.earned_at,
                               seen_at = excluded.seen_at,
                               updated_at = excluded.updated_at",
                rusqlite::params![
                    record.user_id.to_string(),
                    record.achievement_id.to_string(),
                    record.progress,
                    record.earned_at.map(|d| d.to_rfc3339()),
                    record.seen_at.map(|d| d.to_rfc3339()),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Earned first (newest unlock on top), in-progress after.
    pub fn list_user_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<(Achievement, UserAchievement)>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.code, a.type, a.title, a.description,
                        ua.user_id, ua.achievement_id, ua.progress, ua.earned_at, ua.seen_at, ua.updated_at
                 FROM user_achievements ua
                 JOIN achievements a ON a.id = ua.achievement_id
                 WHERE ua.user_id = ?1
                 ORDER BY ua.earned_at IS NULL, ua.earned_at DESC, ua.progress DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok((
                        AchievementRow {
                            id: row.get(0)?,
                            code: row.get(1)?,
                            achievement_type: row.get(2)?,
                            title: row.get(3)?,
                            description: row.get(4)?,
                        },
                        UserAchievementRow {
                            user_id: row.get(5)?,
                            achievement_id: row.get(6)?,
                            progress: row.get(7)?,
                            earned_at: row.get(8)?,
                            seen_at: row.get(9)?,
                            updated_at: row.get(10)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter()
            .map(|(a, ua)| Ok((a.into_model()?, ua.into_model()?)))
            .collect()
    }

    /// Acknowledge the unlock notification. Only flips once, and only
    /// after the achievement is actually earned.
    pub fn mark_achievement_seen(
        &self,
        user_id: &str,
        achievement_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE user_achievements SET seen_at = ?3
                 WHERE user_id = ?1 AND achievement_id = ?2
                   AND earned_at IS NOT NULL AND seen_at IS NULL",
                rusqlite::params![user_id, achievement_id, now.to_rfc3339()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Meadows --

    /// Creates the meadow and enrolls the host as a HOST participant in
    /// one transaction.
    pub fn create_meadow(&self, meadow: &Meadow) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO meadows
                   (id, name, description, meadow_type, status, host_id, scheduled_at, location, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    meadow.id.to_string(),
                    meadow.name,
                    meadow.description,
                    meadow.meadow_type.as_str(),
                    meadow.status.as_str(),
                    meadow.host_id.to_string(),
                    meadow.scheduled_at.to_rfc3339(),
                    meadow.location,
                    meadow.created_at.to_rfc3339(),
                ],
            )?;
            tx.execute(
                "INSERT INTO meadow_participants (meadow_id, user_id, role, created_at)
                 VALUES (?1, ?2, 'HOST', ?3)",
                rusqlite::params![
                    meadow.id.to_string(),
                    meadow.host_id.to_string(),
                    meadow.created_at.to_rfc3339(),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_meadow(&self, id: &str) -> Result<Option<Meadow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, meadow_type, status, host_id, scheduled_at, location, created_at
                 FROM meadows WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], meadow_from_row).optional()?;
            Ok(row)
        })?
        .map(MeadowRow::into_model)
        .transpose()
    }

    pub fn list_meadows(&self, status: Option<&str>, meadow_type: Option<&str>) -> Result<Vec<Meadow>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, meadow_type, status, host_id, scheduled_at, location, created_at
                 FROM meadows
                 WHERE (?1 IS NULL OR status = ?1)
                   AND (?2 IS NULL OR meadow_type = ?2)
                 ORDER BY scheduled_at ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![status, meadow_type], meadow_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(MeadowRow::into_model).collect()
    }

    /// Returns false when already enrolled.
    pub fn join_meadow(&self, meadow_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO meadow_participants (meadow_id, user_id, role, created_at)
                 VALUES (?1, ?2, 'PARTICIPANT', ?3)",
                rusqlite::params![meadow_id, user_id, now.to_rfc3339()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn leave_meadow(&self, meadow_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM meadow_participants
                 WHERE meadow_id = ?1 AND user_id = ?2 AND role != 'HOST'",
                rusqlite::params![meadow_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Host-only completion; conditional so a double completion is a
    /// no-op the caller can detect.
    pub fn complete_meadow(&self, meadow_id: &str, host_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE meadows SET status = 'COMPLETED'
                 WHERE id = ?1 AND host_id = ?2 AND status != 'COMPLETED'",
                rusqlite::params![meadow_id, host_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn meadow_participants(&self, meadow_id: &str) -> Result<Vec<MeadowParticipant>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT meadow_id, user_id, role, created_at
                 FROM meadow_participants WHERE meadow_id = ?1
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([meadow_id], |row| {
                    Ok(MeadowParticipantRow {
                        meadow_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter()
            .map(MeadowParticipantRow::into_model)
            .collect()
    }

    pub fn is_meadow_participant(&self, meadow_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM meadow_participants WHERE meadow_id = ?1 AND user_id = ?2",
                rusqlite::params![meadow_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    // -- Resources --

    /// Creates the resource and its category links in one transaction;
    /// unknown category names are created on the fly.
    pub fn create_resource(&self, resource: &Resource) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO resources
                   (id, title, description, resource_type, url, body, access, stage, author_id, meadow_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    resource.id.to_string(),
                    resource.title,
                    resource.description,
                    resource.resource_type.as_str(),
                    resource.url,
                    resource.body,
                    resource.access.as_str(),
                    resource.stage.map(|s| s.as_str()),
                    resource.author_id.to_string(),
                    resource.meadow_id.map(|id| id.to_string()),
                    resource.created_at.to_rfc3339(),
                ],
            )?;
            for name in &resource.categories {
                tx.execute(
                    "INSERT OR IGNORE INTO resource_categories (id, name) VALUES (?1, ?2)",
                    rusqlite::params![uuid::Uuid::new_v4().to_string(), name],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO resource_category_links (resource_id, category_id)
                     SELECT ?1, id FROM resource_categories WHERE name = ?2",
                    rusqlite::params![resource.id.to_string(), name],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_resources(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Resource>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT r.id, r.title, r.description, r.resource_type, r.url, r.body,
                        r.access, r.stage, r.author_id, r.meadow_id, r.created_at
                 FROM resources r
                 LEFT JOIN resource_category_links l ON l.resource_id = r.id
                 LEFT JOIN resource_categories c ON c.id = l.category_id
                 WHERE (?1 IS NULL OR c.name = ?1)
                   AND (?2 IS NULL OR r.title LIKE ?3 OR r.description LIKE ?3)
                 ORDER BY r.created_at DESC",
            )?;
            let pattern = search.map(|s| format!("%{s}%"));
            let rows = stmt
                .query_map(
                    rusqlite::params![category, search, pattern],
                    |row| {
                        Ok(ResourceRow {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                            resource_type: row.get(3)?,
                            url: row.get(4)?,
                            body: row.get(5)?,
                            access: row.get(6)?,
                            stage: row.get(7)?,
                            author_id: row.get(8)?,
                            meadow_id: row.get(9)?,
                            created_at: row.get(10)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut resources = Vec::with_capacity(rows.len());
        for row in rows {
            let categories = self.resource_categories_for(&row.id)?;
            resources.push(row.into_model(categories)?);
        }
        Ok(resources)
    }

    fn resource_categories_for(&self, resource_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.name FROM resource_categories c
                 JOIN resource_category_links l ON l.category_id = c.id
                 WHERE l.resource_id = ?1
                 ORDER BY c.name",
            )?;
            let names = stmt
                .query_map([resource_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    pub fn list_categories(&self) -> Result<Vec<ResourceCategory>> {
        let rows = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name FROM resource_categories ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter()
            .map(|(id, name)| {
                Ok(ResourceCategory {
                    id: crate::models::parse_uuid(&id)?,
                    name,
                })
            })
            .collect()
    }

    pub fn create_category(&self, id: &str, name: &str) -> Result<ResourceCategory> {
        let (id, name) = self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO resource_categories (id, name) VALUES (?1, ?2)",
                rusqlite::params![id, name],
            )?;
            let row = conn.query_row(
                "SELECT id, name FROM resource_categories WHERE name = ?1",
                [name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?;
            Ok(row)
        })?;
        Ok(ResourceCategory {
            id: crate::models::parse_uuid(&id)?,
            name,
        })
    }
}

fn query_user(conn: &Connection, filter: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, password, display_name, current_stage, stage_updated_at, created_at
         FROM users WHERE {filter}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                display_name: row.get(3)?,
                current_stage: row.get(4)?,
                stage_updated_at: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_proposal(conn: &Connection, id: &str) -> Result<Option<ProposalRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, content, vote_type, vote_status,
                start_date, end_date, quorum, threshold, result, author_id, created_at, closed_at
         FROM proposals WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], proposal_from_row).optional()?;
    Ok(row)
}

fn proposal_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProposalRow> {
    Ok(ProposalRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        vote_type: row.get(4)?,
        vote_status: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        quorum: row.get(8)?,
        threshold: row.get(9)?,
        result: row.get(10)?,
        author_id: row.get(11)?,
        created_at: row.get(12)?,
        closed_at: row.get(13)?,
    })
}

fn transition_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StageTransitionRow> {
    Ok(StageTransitionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        from_stage: row.get(2)?,
        to_stage: row.get(3)?,
        reason: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn achievement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AchievementRow> {
    Ok(AchievementRow {
        id: row.get(0)?,
        code: row.get(1)?,
        achievement_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
    })
}

fn user_achievement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserAchievementRow> {
    Ok(UserAchievementRow {
        user_id: row.get(0)?,
        achievement_id: row.get(1)?,
        progress: row.get(2)?,
        earned_at: row.get(3)?,
        seen_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn meadow_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MeadowRow> {
    Ok(MeadowRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        meadow_type: row.get(3)?,
        status: row.get(4)?,
        host_id: row.get(5)?,
        scheduled_at: row.get(6)?,
        location: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
