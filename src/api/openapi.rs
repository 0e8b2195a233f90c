use crate::api::handlers::{auth, health, invites};
use utoipa::openapi::{InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both
/// served and included in the generated spec. Page routes (`/login`, the
/// console areas) are added outside and intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::session::login))
        .routes(routes!(auth::session::logout))
        .routes(routes!(auth::session::refresh))
        .routes(routes!(auth::session::session))
        .routes(routes!(invites::create, invites::list))
        .routes(routes!(invites::redeem))
        .routes(routes!(invites::bootstrap));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Session issuance, rotation, and introspection".to_string());
    let mut invites_tag = Tag::new("invites");
    invites_tag.description = Some("Invitation capability tokens and onboarding".to_string());
    router.get_openapi_mut().tags = Some(vec![auth_tag, invites_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    let license_id = env!("CARGO_PKG_LICENSE");
    if !license_id.is_empty() {
        let mut license = License::new(license_id);
        license.identifier = Some(license_id.to_string());
        info.license = Some(license);
    }

    OpenApiBuilder::new().info(info).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_paths() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/v1/auth/login"));
        assert!(paths.contains_key("/v1/auth/logout"));
        assert!(paths.contains_key("/v1/auth/refresh"));
        assert!(paths.contains_key("/v1/auth/session"));
        assert!(paths.contains_key("/v1/auth/bootstrap"));
        assert!(paths.contains_key("/v1/invites/redeem"));
        assert!(paths.contains_key("/admin/invites"));
    }

    #[test]
    fn openapi_info_uses_cargo_metadata() {
        let doc = openapi();
        assert_eq!(doc.info.title, "enirejo");
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
    }
}
