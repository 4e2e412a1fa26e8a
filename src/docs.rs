use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, catalog, context, models, pagination, routes};

#[derive(OpenApi)]
#[openapi(
	info(title = "Civic Portal API", description = "Content administration for the municipal website"),
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::context::show_context,
		routes::context::show_badges,
		routes::news::list_news,
		routes::news::get_news,
		routes::news::create_news,
		routes::news::update_news,
		routes::news::delete_news,
		routes::news::toggle_featured,
		routes::news::toggle_status,
		routes::bids_awards::list_bids_awards,
		routes::bids_awards::get_bids_award,
		routes::bids_awards::create_bids_award,
		routes::bids_awards::update_bids_award,
		routes::bids_awards::delete_bids_award,
		routes::bids_awards::toggle_featured,
		routes::bids_awards::toggle_status,
		routes::tourism_packages::list_tourism_packages,
		routes::tourism_packages::get_tourism_package,
		routes::tourism_packages::create_tourism_package,
		routes::tourism_packages::update_tourism_package,
		routes::tourism_packages::delete_tourism_package,
		routes::tourism_packages::toggle_featured,
		routes::tourism_packages::toggle_status,
		routes::awards_recognitions::list_awards,
		routes::awards_recognitions::get_award,
		routes::awards_recognitions::create_award,
		routes::awards_recognitions::update_award,
		routes::awards_recognitions::delete_award,
		routes::awards_recognitions::toggle_featured,
		routes::awards_recognitions::toggle_status,
		routes::full_disclosures::list_disclosures,
		routes::full_disclosures::get_disclosure,
		routes::full_disclosures::create_disclosure,
		routes::full_disclosures::update_disclosure,
		routes::full_disclosures::delete_disclosure,
		routes::full_disclosures::toggle_featured,
		routes::full_disclosures::toggle_status,
		routes::ordinance_resolutions::list_ordinances,
		routes::ordinance_resolutions::get_ordinance,
		routes::ordinance_resolutions::create_ordinance,
		routes::ordinance_resolutions::update_ordinance,
		routes::ordinance_resolutions::delete_ordinance,
		routes::ordinance_resolutions::toggle_featured,
		routes::ordinance_resolutions::toggle_status,
		routes::sb_members::list_members,
		routes::sb_members::get_member,
		routes::sb_members::create_member,
		routes::sb_members::update_member,
		routes::sb_members::delete_member,
		routes::sb_members::toggle_featured,
		routes::sb_members::toggle_status,
		routes::users::list_users,
		routes::users::list_permission_options,
		routes::users::get_user,
		routes::users::create_user,
		routes::users::update_user,
		routes::users::update_permissions,
		routes::users::toggle_user_status,
		routes::users::delete_user,
		routes::trash::list_trash,
		routes::trash::restore_news,
		routes::trash::force_delete_news,
		routes::activity_logs::list_activity_logs,
		routes::activity_logs::get_activity_log,
		routes::files::serve_file
	),
	components(
		schemas(
			authz::PermissionKey,
			catalog::OptionItem,
			catalog::CategoryOptions,
			context::ContextUser,
			context::ViewContext,
			pagination::PageLinks,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::user::PermissionsUpdateRequest,
			models::news::News,
			models::news::NewsFormSchema,
			models::bids_award::BidsAward,
			models::bids_award::BidsAwardFormSchema,
			models::tourism_package::TourismPackage,
			models::tourism_package::TourismPackageFormSchema,
			models::awards_recognition::AwardsRecognition,
			models::awards_recognition::AwardsRecognitionFormSchema,
			models::full_disclosure::FullDisclosure,
			models::full_disclosure::FullDisclosureFormSchema,
			models::ordinance_resolution::OrdinanceResolution,
			models::ordinance_resolution::OrdinanceResolutionFormSchema,
			models::sb_member::SbMember,
			models::sb_member::SbMemberFormSchema,
			models::activity_log::ActivityLog,
			routes::auth::MessageResponse,
			routes::health::HealthResponse,
			routes::users::PermissionOption
		)
	),
	tags(
		(name = "Auth", description = "Sign in and the current account"),
		(name = "Context", description = "Navigation flags and badge counts"),
		(name = "News", description = "News and announcements"),
		(name = "Bids & Awards", description = "Procurement notices"),
		(name = "Tourism", description = "Tourism packages"),
		(name = "Awards & Recognitions", description = "Awards received by the municipality"),
		(name = "Full Disclosure", description = "Full disclosure policy documents"),
		(name = "Ordinances & Resolutions", description = "Legislative records"),
		(name = "Sangguniang Bayan", description = "Council member directory"),
		(name = "Users", description = "Account administration"),
		(name = "Trash", description = "Soft-deleted news"),
		(name = "Activity Logs", description = "Audit trail"),
		(name = "Files", description = "Stored uploads"),
		(name = "Health", description = "Liveness")
	)
)]
pub struct ApiDoc;

/// Paths that need no bearer token.
const PUBLIC_PATHS: &[&str] = &["/api/health", "/api/auth/login"];

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	normalize_path_operations(&mut doc);
	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	open_public_paths(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn normalize_path_operations(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		let snapshot = paths.clone();
		for (path, item) in snapshot {
			if let Some(ops) = item.as_object() {
				let mut normalized = Map::new();
				for (method, val) in ops {
					let key = method.to_lowercase();
					if let Some(existing) = normalized.get_mut(&key) {
						merge_values(existing, val);
					} else {
						normalized.insert(key, val.clone());
					}
				}
				paths.insert(path, Value::Object(normalized));
			}
		}
	}
}

fn object_entry<'a>(doc: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
	doc.as_object_mut()?
		.entry(key)
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
}

fn ensure_security_components(doc: &mut Value) {
	let Some(components) = object_entry(doc, "components") else { return; };
	let Some(schemes) = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
	else {
		return;
	};

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
}

fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

/// Clears the global requirement on endpoints reachable without a token.
fn open_public_paths(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };
	for public in PUBLIC_PATHS {
		if let Some(operations) = paths.get_mut(*public).and_then(Value::as_object_mut) {
			for operation in operations.values_mut() {
				if let Some(op) = operation.as_object_mut() {
					op.insert("security".to_string(), json!([]));
				}
			}
		}
	}
}

fn add_examples(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(operations) = item.as_object_mut() {
				for operation in operations.values_mut() {
					apply_parameter_examples(operation);
					apply_request_examples(operation);
				}
			}
		}
	}
}

fn apply_parameter_examples(operation: &mut Value) {
	let Some(parameters) = operation.get_mut("parameters").and_then(Value::as_array_mut) else { return; };
	for parameter in parameters.iter_mut() {
		let example = match parameter.get("name").and_then(Value::as_str) {
			Some("id") => json!(1),
			Some("page") => json!(1),
			Some("per_page") => json!(15),
			_ => continue,
		};
		if let Some(obj) = parameter.as_object_mut() {
			obj.entry("example").or_insert(example);
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(request_body) = operation.get_mut("requestBody") else { return; };
	let Some(content) = request_body.get_mut("content").and_then(Value::as_object_mut) else { return; };
	let Some(app_json) = content.get_mut("application/json").and_then(Value::as_object_mut) else { return; };
	let Some(schema) = app_json.get("schema").and_then(Value::as_object) else { return; };
	let Some(reference) = schema.get("$ref").and_then(Value::as_str) else { return; };

	let example = match reference {
		"#/components/schemas/LoginRequest" => Some(json!({
			"email": "admin@municipality.gov.ph",
			"password": "S3cureP@ssw0rd"
		})),
		"#/components/schemas/UserCreateRequest" => Some(json!({
			"name": "Maria Santos",
			"email": "maria@municipality.gov.ph",
			"password": "S3cureP@ssw0rd",
			"role": "staff",
			"permissions": ["news", "trash"],
			"is_active": true
		})),
		"#/components/schemas/PermissionsUpdateRequest" => Some(json!({
			"permissions": ["news", "bids_awards"]
		})),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = std::env::var("APP_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn login_is_public_and_the_rest_needs_a_token() {
		let doc = serde_json::to_value(build_openapi(8000).unwrap()).unwrap();
		assert_eq!(doc["security"], json!([{ "bearerAuth": [] }]));
		assert_eq!(doc["paths"]["/api/auth/login"]["post"]["security"], json!([]));
		assert!(doc["paths"]["/api/news"]["get"].get("security").is_none());
	}
}
