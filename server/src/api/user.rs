use axum::{
    extract::{Path, State},
    Json,
};
use bson::oid::ObjectId;
use mongodb::options::UpdateOptions;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::{is_duplicate_key, Collection},
    util::{ObjectIdString, PathObjectId},
};

use super::{
    auth::AdminAccess,
    token::{generate_access_token, JwtState},
    DeleteResponse, UpdateResponse,
};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserModel {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

#[derive(Clone)]
pub struct UserCollection(pub Collection<UserModel>);

impl std::ops::Deref for UserCollection {
    type Target = Collection<UserModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl UserCollection {
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, Error> {
        self.find_one(bson::doc! { "email": email }, None)
            .await
            .map_err(Into::into)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectIdString,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl From<UserModel> for User {
    fn from(value: UserModel) -> Self {
        Self {
            id: value.id.into(),
            email: value.email,
            name: value.name,
            role: value.role,
        }
    }
}

pub async fn index(State(users): State<UserCollection>) -> Result<Json<Vec<User>>, Error> {
    let users = users.find_all(None).await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 124))]
    pub name: Option<String>,
}

#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn create(
    State(users): State<UserCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<User>, Error> {
    request.validate()?;

    let model = UserModel {
        id: ObjectId::new(),
        email: request.email,
        name: request.name,
        role: None,
    };

    users
        .insert_one(&model, None)
        .await
        .map_err(|err| {
            if is_duplicate_key(&err) {
                Error::MustUniqueError("email".to_string())
            } else {
                err.into()
            }
        })?;

    Ok(Json(model.into()))
}

#[derive(Validate)]
struct EmailParam {
    #[validate(email)]
    email: String,
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpsertRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<ObjectIdString>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpsertResponse {
    pub result: UpsertResult,
    pub token: String,
}

/// Creates or refreshes the profile stored under `email` and hands back a
/// fresh credential for it. The role is never written here.
#[tracing::instrument(skip_all, fields(email = %email))]
pub async fn upsert(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    Path(email): Path<String>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<UpsertResponse>, Error> {
    EmailParam {
        email: email.clone(),
    }
    .validate()?;
    request.validate()?;

    let mut set = bson::doc! { "email": &email };
    if let Some(name) = request.name {
        set.insert("name", name);
    }

    let result = users
        .update_one(
            bson::doc! { "email": &email },
            bson::doc! { "$set": set },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await?;

    let token = generate_access_token(&jwt_state, &email)?;

    Ok(Json(UpsertResponse {
        result: UpsertResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result
                .upserted_id
                .and_then(|it| it.as_object_id())
                .map(Into::into),
        },
        token,
    }))
}

#[tracing::instrument(skip_all, fields(admin = %admin.principal.email, id = %id))]
pub async fn make_admin(
    admin: AdminAccess,
    State(users): State<UserCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<UpdateResponse>, Error> {
    let result = users
        .update_one(
            bson::doc! { "_id": id },
            bson::doc! { "$set": { "role": ADMIN_ROLE } },
            None,
        )
        .await?;

    tracing::debug!("granted admin to {} matched {}", id, result.matched_count);

    Ok(Json(result.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IsAdminResponse {
    pub admin: bool,
}

pub async fn is_admin(
    State(users): State<UserCollection>,
    Path(email): Path<String>,
) -> Result<Json<IsAdminResponse>, Error> {
    let admin = users
        .find_by_email(&email)
        .await?
        .map_or(false, |it| it.is_admin());

    Ok(Json(IsAdminResponse { admin }))
}

#[tracing::instrument(skip_all, fields(admin = %admin.principal.email, id = %id))]
pub async fn delete(
    admin: AdminAccess,
    State(users): State<UserCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<DeleteResponse>, Error> {
    let deleted_count = users
        .delete_one_by_id(id)
        .await
        .tap_ok(|count| tracing::debug!("deleted {} users", count))?;

    Ok(Json(DeleteResponse { deleted_count }))
}
