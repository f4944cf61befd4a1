use std::collections::HashMap;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::{StoreId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub address: String,
    /// Raw role attribute as stored by the backend. Coerced into the closed
    /// role set only at the resolver boundary.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreRecord {
    pub id: StoreId,
    pub name: String,
    pub address: String,
    pub email: Option<String>,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Rating joined with the rater's profile name for display.
#[derive(Debug, Clone, Serialize)]
pub struct RatingView {
    pub id: Uuid,
    pub store_id: StoreId,
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub score: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub address: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct NewStore {
    pub name: String,
    pub address: String,
    pub email: Option<String>,
    pub owner_email: Option<String>,
}

#[derive(Debug, Clone)]
struct Credential {
    user_id: UserId,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct RatingRecord {
    id: Uuid,
    store_id: StoreId,
    user_id: UserId,
    score: u8,
    comment: String,
    created_at: DateTime<Utc>,
}

fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// In-process stand-in for the hosted record store: credentials, profiles,
/// stores and ratings behind read-write locks. Single round-trip semantics
/// per operation, no cross-operation transactions.
#[derive(Default)]
pub struct MemoryBackend {
    credentials: RwLock<HashMap<String, Credential>>,
    profiles: RwLock<HashMap<UserId, Profile>>,
    stores: RwLock<HashMap<StoreId, StoreRecord>>,
    ratings: RwLock<Vec<RatingRecord>>,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    /// Create an auth account plus its profile row. New accounts always get
    /// the least-privileged role; promotion is an admin operation.
    pub fn sign_up(&self, account: &NewAccount) -> AppResult<UserId> {
        self.create_account(account, "user")
    }

    fn create_account(&self, account: &NewAccount, role: &str) -> AppResult<UserId> {
        let email = account.email.trim().to_ascii_lowercase();
        let mut creds = self.credentials.write();
        if creds.contains_key(&email) {
            return Err(AppError::conflict("Email already exists. Please log in instead."));
        }
        let user_id = Uuid::new_v4();
        let password_hash = hash_password(&account.password)?;
        creds.insert(email.clone(), Credential { user_id, password_hash });
        self.profiles.write().insert(
            user_id,
            Profile {
                id: user_id,
                name: account.name.trim().to_string(),
                email,
                address: account.address.trim().to_string(),
                role: role.to_string(),
                created_at: Utc::now(),
            },
        );
        info!(user = %user_id, role, "account created");
        Ok(user_id)
    }

    /// Verify credentials. The error message is user-facing.
    pub fn authenticate(&self, email: &str, password: &str) -> AppResult<UserId> {
        let email = email.trim().to_ascii_lowercase();
        let creds = self.credentials.read();
        let Some(cred) = creds.get(&email) else {
            return Err(AppError::auth("Invalid login credentials"));
        };
        if !verify_password(&cred.password_hash, password) {
            return Err(AppError::auth("Invalid login credentials"));
        }
        Ok(cred.user_id)
    }

    pub fn profile(&self, user_id: UserId) -> Option<Profile> {
        self.profiles.read().get(&user_id).cloned()
    }

    pub fn profile_by_email(&self, email: &str) -> Option<Profile> {
        let email = email.trim().to_ascii_lowercase();
        self.profiles.read().values().find(|p| p.email == email).cloned()
    }

    pub(super) fn role_attr(&self, user_id: UserId) -> Option<String> {
        self.profiles.read().get(&user_id).map(|p| p.role.clone())
    }

    /// All profiles, newest first. Admin users table.
    pub fn profiles(&self) -> Vec<Profile> {
        let mut out: Vec<Profile> = self.profiles.read().values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Overwrite a user's raw role attribute. The value is stored as given;
    /// consumers coerce on read.
    pub fn set_role(&self, user_id: UserId, role: &str) -> AppResult<()> {
        let mut profiles = self.profiles.write();
        let Some(profile) = profiles.get_mut(&user_id) else {
            return Err(AppError::not_found("user not found"));
        };
        profile.role = role.trim().to_ascii_lowercase();
        info!(user = %user_id, role = %profile.role, "role updated");
        Ok(())
    }

    pub fn create_store(&self, new: &NewStore) -> AppResult<StoreRecord> {
        let owner_id = match &new.owner_email {
            Some(email) => {
                let Some(profile) = self.profile_by_email(email) else {
                    return Err(AppError::user(format!("no profile with email {email}")));
                };
                Some(profile.id)
            }
            None => None,
        };
        let record = StoreRecord {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            address: new.address.trim().to_string(),
            email: new.email.as_ref().map(|e| e.trim().to_ascii_lowercase()),
            owner_id,
            created_at: Utc::now(),
        };
        self.stores.write().insert(record.id, record.clone());
        info!(store = %record.id, name = %record.name, "store created");
        Ok(record)
    }

    pub fn store(&self, id: StoreId) -> Option<StoreRecord> {
        self.stores.read().get(&id).cloned()
    }

    /// All stores, optionally filtered by a case-insensitive name search.
    pub fn stores(&self, search: Option<&str>) -> Vec<StoreRecord> {
        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let mut out: Vec<StoreRecord> = self
            .stores
            .read()
            .values()
            .filter(|s| match &needle {
                Some(n) => s.name.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn stores_owned_by(&self, owner: UserId) -> Vec<StoreRecord> {
        let mut out: Vec<StoreRecord> = self
            .stores
            .read()
            .values()
            .filter(|s| s.owner_id == Some(owner))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Record a rating. The score range is enforced here as well as at the
    /// edge: a record store must never hold an out-of-range score.
    pub fn add_rating(
        &self,
        store_id: StoreId,
        user_id: UserId,
        score: u8,
        comment: &str,
    ) -> AppResult<RatingView> {
        if !(1..=5).contains(&score) {
            return Err(AppError::user("score must be between 1 and 5"));
        }
        if !self.stores.read().contains_key(&store_id) {
            return Err(AppError::not_found("store not found"));
        }
        let record = RatingRecord {
            id: Uuid::new_v4(),
            store_id,
            user_id,
            score,
            comment: comment.trim().to_string(),
            created_at: Utc::now(),
        };
        self.ratings.write().push(record.clone());
        Ok(self.to_view(&record))
    }

    /// Ratings for one store, newest first, joined with rater names.
    /// The log is append-only, so reverse insertion order is newest first
    /// even when two ratings share a timestamp.
    pub fn ratings_for(&self, store_id: StoreId) -> Vec<RatingView> {
        self.ratings
            .read()
            .iter()
            .rev()
            .filter(|r| r.store_id == store_id)
            .map(|r| self.to_view(r))
            .collect()
    }

    pub fn average_score(&self, store_id: StoreId) -> Option<f64> {
        let ratings = self.ratings.read();
        let scores: Vec<u8> =
            ratings.iter().filter(|r| r.store_id == store_id).map(|r| r.score).collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64)
    }

    fn to_view(&self, r: &RatingRecord) -> RatingView {
        RatingView {
            id: r.id,
            store_id: r.store_id,
            user_id: r.user_id,
            user_name: self.profile(r.user_id).map(|p| p.name),
            score: r.score,
            comment: r.comment.clone(),
            created_at: r.created_at,
        }
    }

    /// First-run seeding: create an admin account if the email is free.
    /// Returns whether anything was created.
    pub fn seed_admin(&self, email: &str, password: &str) -> AppResult<bool> {
        if self.profile_by_email(email).is_some() {
            return Ok(false);
        }
        self.create_account(
            &NewAccount {
                name: "Administrator".to_string(),
                email: email.to_string(),
                address: "-".to_string(),
                password: password.to_string(),
            },
            "admin",
        )?;
        info!(email, "default admin seeded");
        Ok(true)
    }
}
