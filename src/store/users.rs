use super::{RecordStore, StoreState};
use crate::core::{NewUser, RecordId, Result, StoreError, User, UserPatch};
use crate::query::{self, UserFilter};
use chrono::Utc;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(StoreError::validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

fn ensure_login_free(state: &StoreState, login: &str, owner: Option<RecordId>) -> Result<()> {
    let taken = state
        .users
        .records()
        .iter()
        .any(|u| u.login == login && Some(u.id) != owner);
    if taken {
        Err(StoreError::DuplicateLogin(login.to_string()))
    } else {
        Ok(())
    }
}

impl RecordStore {
    /// Creates a user. Fails with [`StoreError::DuplicateLogin`] when the
    /// login is already in use.
    pub async fn add_user(&self, draft: NewUser) -> Result<User> {
        require("full name", &draft.full_name)?;
        require("login", &draft.login)?;
        require("password", &draft.password)?;

        let login = draft.login.trim().to_string();
        self.insert_with(move |id, state| {
            ensure_login_free(state, &login, None)?;
            let department = draft
                .department
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| draft.role.default_department().to_string());
            Ok(User {
                id,
                full_name: draft.full_name.trim().to_string(),
                role: draft.role,
                login,
                password: draft.password,
                department,
                created_at: Utc::now(),
            })
        })
        .await
    }

    pub async fn update_user(&self, id: RecordId, patch: UserPatch) -> Result<Option<User>> {
        if let Some(login) = &patch.login {
            require("login", login)?;
        }
        if let Some(full_name) = &patch.full_name {
            require("full name", full_name)?;
        }
        self.update_with(id, move |user: &mut User, state| {
            if let Some(login) = &patch.login {
                ensure_login_free(state, login, Some(user.id))?;
            }
            patch.apply_to(user);
            Ok(())
        })
        .await
    }

    pub async fn delete_user(&self, id: RecordId) -> Result<bool> {
        self.remove::<User>(id).await
    }

    pub async fn user_by_id(&self, id: RecordId) -> Option<User> {
        self.fetch_one(id).await
    }

    pub async fn user_by_login(&self, login: &str) -> Option<User> {
        self.ready().await;
        self.read_state()
            .users
            .records()
            .iter()
            .find(|u| u.login == login)
            .cloned()
    }

    /// The user whose login and password both match.
    pub async fn authenticate(&self, login: &str, password: &str) -> Option<User> {
        self.user_by_login(login.trim())
            .await
            .filter(|user| user.password == password)
    }

    pub async fn all_users(&self) -> Vec<User> {
        self.fetch_all().await
    }

    pub async fn filter_users(&self, filter: &UserFilter) -> Vec<User> {
        self.ready().await;
        query::filter_users(self.read_state().users.records(), filter)
    }
}
