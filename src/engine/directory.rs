use tracing::info;
use ulid::Ulid;

use crate::access::Capability;
use crate::limits::*;
use crate::model::*;

use super::error::{Conflict, Entity, Rule};
use super::policy::{self, now_ms};
use super::{Engine, EngineError};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub corporate_id: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub role_id: Ulid,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub corporate_id: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<Ulid>,
    pub is_active: Option<bool>,
}

impl UserPatch {
    /// Fields a user may change on their own profile.
    fn only_self_service(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.corporate_id.is_none()
            && self.role_id.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub level: Role,
}

#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub level: Option<Role>,
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl Engine {
    /// The acting identity for an active user, with the role level resolved
    /// through their role record.
    pub fn actor_for(&self, user_id: Ulid) -> Option<Actor> {
        let user = self.users.get(&user_id)?;
        if !user.is_active {
            return None;
        }
        let role = self.roles.get(&user.role_id)?;
        Some(Actor {
            id: user_id,
            role: role.level,
        })
    }

    /// Seed roles and an administrator into an empty directory. Returns the
    /// new administrator, or `None` when users already exist.
    pub async fn bootstrap(&self, username: &str, email: &str) -> Result<Option<User>, EngineError> {
        let _catalog = self.catalog.lock().await;
        if !self.users.is_empty() {
            return Ok(None);
        }
        let now = now_ms();
        let mut admin_role = None;
        for (name, description, level) in [
            ("Administrator", "Full access to fleet administration", Role::Administrator),
            ("Standard", "Books and manages own reservations", Role::Standard),
        ] {
            let existing = self
                .roles
                .iter()
                .find(|r| r.level == level)
                .map(|r| r.id);
            let id = match existing {
                Some(id) => id,
                None => {
                    let role = RoleRecord {
                        id: Ulid::new(),
                        name: name.to_string(),
                        description: Some(description.to_string()),
                        level,
                        created_at: now,
                    };
                    let id = role.id;
                    self.persist_and_apply(&mut [], &Event::RoleCreated { role })
                        .await?;
                    id
                }
            };
            if level == Role::Administrator {
                admin_role = Some(id);
            }
        }
        let Some(role_id) = admin_role else {
            return Ok(None);
        };

        let user = User {
            id: Ulid::new(),
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Administrator".to_string(),
            corporate_id: None,
            department: None,
            phone: None,
            is_active: true,
            role_id,
            created_at: now,
            updated_at: now,
        };
        self.persist_and_apply(&mut [], &Event::UserCreated { user: user.clone() })
            .await?;
        info!("bootstrapped administrator '{}' with id {}", user.username, user.id);
        Ok(Some(user))
    }

    // ── Users ────────────────────────────────────────────────────

    pub fn get_user(&self, actor: &Actor, id: Ulid) -> Result<User, EngineError> {
        if id != actor.id {
            policy::require(actor, Capability::ManageUsers)?;
        }
        self.users
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or(EngineError::NotFound(Entity::User, id))
    }

    pub fn list_users(
        &self,
        actor: &Actor,
        active: Option<bool>,
        role_id: Option<Ulid>,
    ) -> Result<Vec<User>, EngineError> {
        policy::require(actor, Capability::ManageUsers)?;
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| active.is_none_or(|a| u.is_active == a))
            .filter(|u| role_id.is_none_or(|r| u.role_id == r))
            .map(|u| u.value().clone())
            .collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    /// Uniqueness for username, email and corporate id, skipping `except`.
    fn check_user_unique(
        &self,
        username: &str,
        email: &str,
        corporate_id: Option<&str>,
        except: Option<Ulid>,
    ) -> Result<(), EngineError> {
        for other in self.users.iter() {
            if Some(other.id) == except {
                continue;
            }
            if same_text(&other.username, username) {
                return Err(EngineError::duplicate("username", username.trim()));
            }
            if same_text(&other.email, email) {
                return Err(EngineError::duplicate("email", email.trim()));
            }
            if let (Some(mine), Some(theirs)) = (corporate_id, other.corporate_id.as_deref())
                && same_text(mine, theirs)
            {
                return Err(EngineError::duplicate("corporate_id", mine.trim()));
            }
        }
        Ok(())
    }

    fn check_user_fields(
        username: &str,
        email: &str,
        full_name: &str,
        corporate_id: Option<&str>,
    ) -> Result<(), EngineError> {
        policy::check_required("username", username, MAX_NAME_LEN)?;
        policy::check_required("email", email, MAX_SHORT_TEXT_LEN)?;
        if !email.contains('@') {
            return Err(Rule::Malformed("email").into());
        }
        policy::check_required("full_name", full_name, MAX_SHORT_TEXT_LEN)?;
        policy::check_optional("corporate_id", corporate_id, MAX_NAME_LEN)
    }

    pub async fn create_user(&self, actor: &Actor, req: NewUser) -> Result<User, EngineError> {
        policy::require(actor, Capability::ManageUsers)?;
        let corporate_id = non_empty(req.corporate_id);
        Self::check_user_fields(&req.username, &req.email, &req.full_name, corporate_id.as_deref())?;
        policy::check_optional("department", req.department.as_deref(), MAX_NAME_LEN)?;
        policy::check_optional("phone", req.phone.as_deref(), MAX_NAME_LEN)?;

        let _catalog = self.catalog.lock().await;
        if !self.roles.contains_key(&req.role_id) {
            return Err(EngineError::NotFound(Entity::Role, req.role_id));
        }
        self.check_user_unique(&req.username, &req.email, corporate_id.as_deref(), None)?;

        let now = now_ms();
        let user = User {
            id: Ulid::new(),
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            full_name: req.full_name.trim().to_string(),
            corporate_id,
            department: non_empty(req.department),
            phone: non_empty(req.phone),
            is_active: true,
            role_id: req.role_id,
            created_at: now,
            updated_at: now,
        };
        self.persist_and_apply(&mut [], &Event::UserCreated { user: user.clone() })
            .await?;
        info!("user {} created by {}", user.id, actor.id);
        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: UserPatch,
    ) -> Result<User, EngineError> {
        let is_admin = actor.role.can(Capability::ManageUsers);
        if !is_admin && (id != actor.id || !patch.only_self_service()) {
            return Err(EngineError::Forbidden(
                "users may only change their own department and phone",
            ));
        }

        let _catalog = self.catalog.lock().await;
        let mut next = self
            .users
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or(EngineError::NotFound(Entity::User, id))?;

        if let Some(username) = patch.username {
            next.username = username.trim().to_string();
        }
        if let Some(email) = patch.email {
            next.email = email.trim().to_string();
        }
        if let Some(full_name) = patch.full_name {
            next.full_name = full_name.trim().to_string();
        }
        if let Some(corporate_id) = patch.corporate_id {
            next.corporate_id = non_empty(Some(corporate_id));
        }
        if let Some(department) = patch.department {
            policy::check_optional("department", Some(&department), MAX_NAME_LEN)?;
            next.department = non_empty(Some(department));
        }
        if let Some(phone) = patch.phone {
            policy::check_optional("phone", Some(&phone), MAX_NAME_LEN)?;
            next.phone = non_empty(Some(phone));
        }
        if let Some(role_id) = patch.role_id {
            if !self.roles.contains_key(&role_id) {
                return Err(EngineError::NotFound(Entity::Role, role_id));
            }
            next.role_id = role_id;
        }
        if let Some(active) = patch.is_active {
            next.is_active = active;
        }
        Self::check_user_fields(
            &next.username,
            &next.email,
            &next.full_name,
            next.corporate_id.as_deref(),
        )?;
        self.check_user_unique(&next.username, &next.email, next.corporate_id.as_deref(), Some(id))?;
        next.updated_at = now_ms();

        self.persist_and_apply(&mut [], &Event::UserUpdated { user: next.clone() })
            .await?;
        info!("user {id} updated by {}", actor.id);
        Ok(next)
    }

    pub async fn set_user_active(&self, actor: &Actor, id: Ulid, active: bool) -> Result<User, EngineError> {
        policy::require(actor, Capability::ManageUsers)?;
        if id == actor.id && !active {
            return Err(EngineError::Forbidden("administrators cannot deactivate themselves"));
        }
        let patch = UserPatch {
            is_active: Some(active),
            ..UserPatch::default()
        };
        self.update_user(actor, id, patch).await
    }

    // ── Roles ────────────────────────────────────────────────────

    pub fn list_roles(&self) -> Vec<RoleRecord> {
        let mut roles: Vec<RoleRecord> = self.roles.iter().map(|r| r.value().clone()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    pub fn get_role(&self, id: Ulid) -> Result<RoleRecord, EngineError> {
        self.roles
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(EngineError::NotFound(Entity::Role, id))
    }

    fn check_role_name_unique(&self, name: &str, except: Option<Ulid>) -> Result<(), EngineError> {
        if self
            .roles
            .iter()
            .any(|r| Some(r.id) != except && same_text(&r.name, name))
        {
            return Err(EngineError::duplicate("name", name.trim()));
        }
        Ok(())
    }

    pub async fn create_role(&self, actor: &Actor, req: NewRole) -> Result<RoleRecord, EngineError> {
        policy::require(actor, Capability::ManageUsers)?;
        policy::check_required("name", &req.name, MAX_NAME_LEN)?;
        policy::check_optional("description", req.description.as_deref(), MAX_SHORT_TEXT_LEN)?;

        let _catalog = self.catalog.lock().await;
        self.check_role_name_unique(&req.name, None)?;
        let role = RoleRecord {
            id: Ulid::new(),
            name: req.name.trim().to_string(),
            description: non_empty(req.description),
            level: req.level,
            created_at: now_ms(),
        };
        self.persist_and_apply(&mut [], &Event::RoleCreated { role: role.clone() })
            .await?;
        info!("role '{}' created", role.name);
        Ok(role)
    }

    pub async fn update_role(
        &self,
        actor: &Actor,
        id: Ulid,
        patch: RolePatch,
    ) -> Result<RoleRecord, EngineError> {
        policy::require(actor, Capability::ManageUsers)?;
        let _catalog = self.catalog.lock().await;
        let mut next = self.get_role(id)?;
        if let Some(name) = patch.name {
            policy::check_required("name", &name, MAX_NAME_LEN)?;
            self.check_role_name_unique(&name, Some(id))?;
            next.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            policy::check_optional("description", Some(&description), MAX_SHORT_TEXT_LEN)?;
            next.description = non_empty(Some(description));
        }
        if let Some(level) = patch.level {
            next.level = level;
        }
        self.persist_and_apply(&mut [], &Event::RoleUpdated { role: next.clone() })
            .await?;
        info!("role {id} updated");
        Ok(next)
    }

    pub async fn delete_role(&self, actor: &Actor, id: Ulid) -> Result<(), EngineError> {
        policy::require(actor, Capability::ManageUsers)?;
        let _catalog = self.catalog.lock().await;
        self.get_role(id)?;
        if self.users.iter().any(|u| u.role_id == id) {
            return Err(EngineError::Conflict(Conflict::RoleInUse(id)));
        }
        self.persist_and_apply(&mut [], &Event::RoleDeleted { id }).await?;
        info!("role {id} deleted");
        Ok(())
    }
}
