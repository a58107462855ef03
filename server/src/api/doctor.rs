use axum::{extract::State, Json};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{ObjectIdString, PathObjectId},
};

use super::{auth::AdminAccess, DeleteResponse};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DoctorModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,
    pub specialty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub slots: Vec<String>,
}

#[derive(Clone)]
pub struct DoctorCollection(pub Collection<DoctorModel>);

impl std::ops::Deref for DoctorCollection {
    type Target = Collection<DoctorModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Doctor {
    #[serde(rename = "_id")]
    pub id: ObjectIdString,
    pub name: String,
    pub specialty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub slots: Vec<String>,
}

impl From<DoctorModel> for Doctor {
    fn from(value: DoctorModel) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
            specialty: value.specialty,
            email: value.email,
            slots: value.slots,
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: String,

    #[validate(length(min = 1, max = 124))]
    pub specialty: String,

    #[validate(email)]
    pub email: Option<String>,

    #[serde(default)]
    pub slots: Vec<String>,
}

#[tracing::instrument(skip_all, fields(admin = %admin.principal.email))]
pub async fn create(
    admin: AdminAccess,
    State(doctors): State<DoctorCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<Doctor>, Error> {
    request.validate()?;

    let model = DoctorModel {
        id: ObjectId::new(),
        name: request.name,
        specialty: request.specialty,
        email: request.email,
        slots: request.slots,
    };

    tracing::debug!("creating doctor {:#?}", model);
    doctors.insert_one(&model, None).await?;

    Ok(Json(model.into()))
}

pub async fn index(
    _admin: AdminAccess,
    State(doctors): State<DoctorCollection>,
) -> Result<Json<Vec<Doctor>>, Error> {
    let doctors = doctors.find_all(None).await?;

    Ok(Json(doctors.into_iter().map(Into::into).collect()))
}

#[tracing::instrument(skip_all, fields(admin = %admin.principal.email, id = %id))]
pub async fn delete(
    admin: AdminAccess,
    State(doctors): State<DoctorCollection>,
    PathObjectId(id): PathObjectId,
) -> Result<Json<DeleteResponse>, Error> {
    let deleted_count = doctors.delete_one_by_id(id).await?;

    Ok(Json(DeleteResponse { deleted_count }))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, Json};

    use crate::api::{
        auth::{AdminAccess, Principal},
        tests::bootstrap,
        user::ADMIN_ROLE,
    };

    use super::*;

    #[test]
    fn test_create_request_validation() {
        let request = CreateRequest {
            name: "".to_string(),
            specialty: "Orthodontics".to_string(),
            email: Some("not-an-email".to_string()),
            slots: vec![],
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB at MONGODB_URI"]
    async fn test_admin_manages_doctors() {
        let bootstrap = bootstrap().await;
        let admin = bootstrap.create_user("admin@example.com", Some(ADMIN_ROLE)).await;

        let access = || AdminAccess {
            principal: Principal {
                email: admin.email.clone(),
            },
            user: admin.clone(),
        };

        let Json(doctor) = super::create(
            access(),
            State(bootstrap.app_state.doctor_collection.clone()),
            Json(CreateRequest {
                name: "Dr. Who".to_string(),
                specialty: "Orthodontics".to_string(),
                email: None,
                slots: vec!["9am".to_string()],
            }),
        )
        .await
        .unwrap();

        let Json(doctors) = super::index(access(), State(bootstrap.app_state.doctor_collection.clone()))
            .await
            .unwrap();
        assert_eq!(doctors, vec![doctor.clone()]);

        let Json(deleted) = super::delete(
            access(),
            State(bootstrap.app_state.doctor_collection.clone()),
            PathObjectId(doctor.id.0),
        )
        .await
        .unwrap();
        assert_eq!(deleted.deleted_count, 1);
    }
}
