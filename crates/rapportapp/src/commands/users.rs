use crate::commands::{CmdMessage, CmdResult};
use crate::error::{RapportError, Result, ValidationError};
use crate::model::{field_str, Collection, Row, UserIdentity};
use crate::store::Storage;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

const PASSHASH_FIELD: &str = "passhash";

/// First number of the generated `U-NNNN` user ids.
const SEED_ID_BASE: u32 = 2550;

struct SeedAccount {
    vorname: &'static str,
    nachname: &'static str,
    benutzer: &'static str,
    passwort: &'static str,
    rolle: &'static str,
}

const SEED_ACCOUNTS: [SeedAccount; 3] = [
    SeedAccount {
        vorname: "Admin",
        nachname: "System",
        benutzer: "admin",
        passwort: "3333",
        rolle: "Administrator",
    },
    SeedAccount {
        vorname: "Hans",
        nachname: "Muster",
        benutzer: "user1",
        passwort: "1111",
        rolle: "User",
    },
    SeedAccount {
        vorname: "Anna",
        nachname: "Beispiel",
        benutzer: "user2",
        passwort: "2222",
        rolle: "User",
    },
];

/// Lowercase hex SHA-256 of the password, as stored in `passhash`.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn without_passhash(mut row: Row) -> Row {
    row.shift_remove(PASSHASH_FIELD);
    row
}

fn seed_rows() -> Vec<Row> {
    SEED_ACCOUNTS
        .iter()
        .zip(SEED_ID_BASE..)
        .map(|(account, number)| {
            [
                ("iduser", format!("U-{}", number)),
                ("vorname", account.vorname.to_string()),
                ("nachname", account.nachname.to_string()),
                ("strasse", "Hauptstrasse 1".to_string()),
                ("PLZ", "7000".to_string()),
                ("ort", "Chur".to_string()),
                ("email", format!("{}@example.com", account.benutzer)),
                ("handy", "+41790000000".to_string()),
                ("benutzer", account.benutzer.to_string()),
                (PASSHASH_FIELD, hash_password(account.passwort)),
                ("beruf", "-".to_string()),
                ("arbeitsort", "-".to_string()),
                ("funktion", "-".to_string()),
                ("rolle", account.rolle.to_string()),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), Value::String(value)))
            .collect()
        })
        .collect()
}

/// Write the default accounts when `users` is empty. Never touches an
/// existing user list.
#[instrument(skip(storage))]
pub async fn seed(storage: &Storage) -> Result<CmdResult> {
    let _guard = storage.ctx.locks().lock(Collection::Users).await;
    let existing = storage.records.read_collection(Collection::Users).await?;
    if !existing.is_empty() {
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::info(format!(
            "{} users exist, skipping seed",
            existing.len()
        )));
        return Ok(result);
    }

    let rows = seed_rows();
    storage
        .records
        .write_collection(Collection::Users, &rows)
        .await?;
    info!(count = rows.len(), "seeded users");

    let mut result = CmdResult::default()
        .with_affected_rows(rows.into_iter().map(without_passhash).collect());
    result.add_message(CmdMessage::success("Seeded default users"));
    Ok(result)
}

/// Find the account for `login` and check its password.
///
/// `login` matches the user name, the first name or "first last",
/// case-insensitively. The first matching row decides.
#[instrument(skip(storage, password))]
pub async fn authenticate(storage: &Storage, login: &str, password: &str) -> Result<UserIdentity> {
    let login = login.trim();
    if login.is_empty() {
        return Err(ValidationError::MissingField("benutzer").into());
    }
    if password.is_empty() {
        return Err(ValidationError::MissingField("passwort").into());
    }

    let wanted = login.to_lowercase();
    let users = storage.records.read_collection(Collection::Users).await?;
    let row = users
        .iter()
        .find(|row| {
            let full = format!("{} {}", field_str(row, "vorname"), field_str(row, "nachname"));
            [field_str(row, "benutzer"), field_str(row, "vorname"), full.as_str()]
                .iter()
                .any(|candidate| !candidate.is_empty() && candidate.to_lowercase() == wanted)
        })
        .ok_or(RapportError::InvalidCredentials)?;

    if field_str(row, PASSHASH_FIELD) != hash_password(password) {
        return Err(RapportError::InvalidCredentials);
    }
    Ok(UserIdentity {
        iduser: field_str(row, "iduser").to_string(),
        vorname: field_str(row, "vorname").to_string(),
        nachname: field_str(row, "nachname").to_string(),
        rolle: field_str(row, "rolle").to_string(),
    })
}

/// All users without password hashes. Administrators, superusers and chefs
/// only.
pub async fn list(storage: &Storage, user: &UserIdentity) -> Result<CmdResult> {
    if !user.can_manage_users() {
        return Err(RapportError::PermissionDenied(format!(
            "role {:?} may not list users",
            user.rolle
        )));
    }
    let rows = storage.records.read_collection(Collection::Users).await?;
    Ok(CmdResult::default().with_listed_rows(rows.into_iter().map(without_passhash).collect()))
}
