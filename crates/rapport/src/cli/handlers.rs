use super::render::redacted_config;
use super::setup::{Commands, MassnahmeCommands, ReportCommands, UserCommands};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use rapportapp::model::{Collection, NewReport, UserIdentity};
use rapportapp::{RapportApi, RapportConfig};
use serde_json::{json, Value};
use std::path::Path;

/// What every handler gets: the API, the loaded config and the credentials
/// given on the command line.
pub struct AppState {
    pub api: RapportApi,
    pub config: RapportConfig,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl AppState {
    /// Authenticate `--user` / `--password`.
    pub async fn current_user(&self) -> Result<UserIdentity> {
        let login = self
            .user
            .as_deref()
            .ok_or_else(|| anyhow!("this command needs --user (or RAPPORT_USER)"))?;
        let password = self.password.as_deref().unwrap_or("");
        self.api
            .authenticate(login, password)
            .await
            .with_context(|| format!("login as {:?} failed", login))
    }
}

async fn read_upload(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))
}

pub async fn dispatch(state: &AppState, command: Commands) -> Result<Value> {
    let api = &state.api;
    let value = match command {
        Commands::Init => serde_json::to_value(api.init().await?)?,
        Commands::List => serde_json::to_value(api.list_reports().await?)?,
        Commands::NextId => json!({ "next": api.peek_next_identifier(Local::now()).await? }),
        Commands::Report(ReportCommands::Create {
            anlage,
            bereich,
            titel,
            meldung,
        }) => {
            let me = state.current_user().await?;
            let input = NewReport {
                anlage,
                bereich,
                titel,
                meldung,
            };
            serde_json::to_value(api.create_report(&me, input, Local::now()).await?)?
        }
        Commands::Report(ReportCommands::Show { id }) => {
            serde_json::to_value(api.get_report(&id).await?)?
        }
        Commands::Photo { id, file } => {
            let raw = read_upload(&file).await?;
            serde_json::to_value(api.attach_photo(&id, raw).await?)?
        }
        Commands::Massnahme(MassnahmeCommands::Add { id, text, photo }) => {
            let me = state.current_user().await?;
            let raw = match photo {
                Some(path) => Some(read_upload(&path).await?),
                None => None,
            };
            serde_json::to_value(api.add_massnahme(&id, &me, &text, raw, Local::now()).await?)?
        }
        Commands::Massnahme(MassnahmeCommands::List { id }) => {
            serde_json::to_value(api.massnahmen_for(&id).await?)?
        }
        Commands::Users(UserCommands::Seed) => serde_json::to_value(api.seed_users().await?)?,
        Commands::Users(UserCommands::List) => {
            let me = state.current_user().await?;
            serde_json::to_value(api.list_users(&me).await?)?
        }
        Commands::Users(UserCommands::Login) => serde_json::to_value(state.current_user().await?)?,
        Commands::Dump { collection } => {
            let Some(collection) = Collection::parse(&collection) else {
                bail!("unknown collection {:?}", collection);
            };
            serde_json::to_value(api.read_collection(collection).await?)?
        }
        Commands::Config => redacted_config(&state.config)?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapportapp::test_utils::{mem_storage, png_bytes};
    use std::io::Write;

    fn state(user: Option<&str>, password: Option<&str>) -> AppState {
        let (_backend, storage) = mem_storage();
        AppState {
            api: RapportApi::new(storage),
            config: RapportConfig::default(),
            user: user.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    fn create() -> Commands {
        Commands::Report(ReportCommands::Create {
            anlage: "A".into(),
            bereich: "B".into(),
            titel: "T".into(),
            meldung: "M".into(),
        })
    }

    #[tokio::test]
    async fn create_requires_a_user() {
        let state = state(None, None);
        let err = dispatch(&state, create()).await.unwrap_err();
        assert!(err.to_string().contains("--user"));
    }

    #[tokio::test]
    async fn create_as_seeded_user() {
        let state = state(Some("user1"), Some("1111"));
        dispatch(&state, Commands::Users(UserCommands::Seed)).await.unwrap();

        let created = dispatch(&state, create()).await.unwrap();
        assert_eq!(created["affected_rows"][0]["melder"], "Hans Muster");

        let listed = dispatch(&state, Commands::List).await.unwrap();
        assert_eq!(listed["listed_rows"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_password_is_reported() {
        let state = state(Some("user1"), Some("nope"));
        dispatch(&state, Commands::Users(UserCommands::Seed)).await.unwrap();
        let err = dispatch(&state, Commands::Users(UserCommands::Login)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid credentials"));
    }

    #[tokio::test]
    async fn photo_from_file() {
        let state = state(Some("admin"), Some("3333"));
        dispatch(&state, Commands::Users(UserCommands::Seed)).await.unwrap();
        let created = dispatch(&state, create()).await.unwrap();
        let id = created["affected_rows"][0]["idmeldung"].as_str().unwrap().to_string();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&png_bytes(30, 20)).unwrap();
        let result = dispatch(
            &state,
            Commands::Photo {
                id,
                file: file.path().to_path_buf(),
            },
        )
        .await
        .unwrap();
        assert!(result["messages"][0]["content"]
            .as_str()
            .unwrap()
            .starts_with("Photo stored in photo1"));
    }

    #[tokio::test]
    async fn dump_rejects_unknown_collections() {
        let state = state(None, None);
        assert!(dispatch(&state, Commands::Dump { collection: "x".into() }).await.is_err());
        let users = dispatch(&state, Commands::Dump { collection: "users".into() }).await.unwrap();
        assert_eq!(users, json!([]));
    }
}
