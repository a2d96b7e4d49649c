use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::openapi::ServerBuilder;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::oauth::login,
		routes::oauth::callback,
		routes::oauth::logout,
		routes::oauth::user_info,
		routes::projects::list_projects,
		routes::projects::create_project,
		routes::projects::get_project,
		routes::projects::update_project,
		routes::projects::delete_project,
		routes::projects::receive_project,
		routes::projects::list_received,
		routes::tags::list_tags
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::user::UserProfile,
			models::user::CallbackRequest,
			models::user::LoginUrlResponse,
			models::user::MessageResponse,
			models::project::Project,
			models::project::ProjectCreateRequest,
			models::project::ProjectUpdateRequest,
			models::project::ReceivedItem
		)
	),
	tags(
		(name = "Health", description = "Liveness and dependency checks"),
		(name = "OAuth", description = "Login, callback, logout and session profile"),
		(name = "Projects", description = "Project management and receiving"),
		(name = "Tags", description = "Project tags")
	)
)]
pub struct ApiDoc;

/// Cookie security scheme named after the configured session cookie.
struct SessionCookieScheme<'a> {
	cookie_name: &'a str,
}

impl Modify for SessionCookieScheme<'_> {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"sessionCookie",
			SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(self.cookie_name))),
		);
	}
}

/// OpenAPI document with the API prefix as its server so Try-it-out hits the real routes.
pub fn build_openapi(api_prefix: &str, cookie_name: &str) -> utoipa::openapi::OpenApi {
	let mut doc = ApiDoc::openapi();
	SessionCookieScheme { cookie_name }.modify(&mut doc);
	let server = if api_prefix.is_empty() { "/" } else { api_prefix };
	doc.servers = Some(vec![ServerBuilder::new().url(server).build()]);
	doc
}

pub fn swagger_routes<S>(api_prefix: &str, cookie_name: &str) -> Router<S>
where
	S: Clone + Send + Sync + 'static,
{
	SwaggerUi::new(format!("{api_prefix}/swagger"))
		.url(format!("{api_prefix}/swagger/openapi.json"), build_openapi(api_prefix, cookie_name))
		.into()
}
