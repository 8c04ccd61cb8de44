//! Share page assembly.
//!
//! Turns a fetched [`ProductRecord`] into the view a template renders. One
//! [`PageOptions`] value decides which optional parts appear, so every
//! display variant shares the same template.

use xetivo_share_core::{ProductIdentifier, ProductRecord, RedirectPlan};

use crate::config::ShareConfig;
use crate::records::Projection;

/// Display mode for product pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PageOptions {
    /// Render the description below the name.
    pub show_description: bool,
    /// Render the "Open in app" button.
    pub show_app_button: bool,
    /// Emit Open Graph and Twitter card tags.
    pub emit_social_metadata: bool,
    /// Try the native app as soon as the page loads.
    pub auto_redirect_to_app: bool,
    /// Use the product description in social metadata when present.
    pub description_in_metadata: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            show_description: false,
            show_app_button: true,
            emit_social_metadata: true,
            auto_redirect_to_app: true,
            description_in_metadata: false,
        }
    }
}

impl PageOptions {
    #[must_use]
    pub const fn show_description(mut self, value: bool) -> Self {
        self.show_description = value;
        self
    }

    #[must_use]
    pub const fn show_app_button(mut self, value: bool) -> Self {
        self.show_app_button = value;
        self
    }

    #[must_use]
    pub const fn emit_social_metadata(mut self, value: bool) -> Self {
        self.emit_social_metadata = value;
        self
    }

    #[must_use]
    pub const fn auto_redirect_to_app(mut self, value: bool) -> Self {
        self.auto_redirect_to_app = value;
        self
    }

    #[must_use]
    pub const fn description_in_metadata(mut self, value: bool) -> Self {
        self.description_in_metadata = value;
        self
    }

    /// The record store columns this display mode needs.
    #[must_use]
    pub const fn projection(&self) -> Projection {
        if self.show_description || (self.emit_social_metadata && self.description_in_metadata) {
            Projection::WithDescription
        } else {
            Projection::Minimal
        }
    }
}

/// An image ready for an `<img>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub src: String,
    pub alt: String,
}

/// Open Graph and Twitter card values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialMeta {
    pub title: String,
    pub description: String,
    pub url: String,
    pub site_name: String,
    /// Absolute image URL; omitted from the tags when `None`.
    pub image: Option<String>,
    pub twitter_card: &'static str,
}

/// Everything the product template renders.
#[derive(Debug, Clone)]
pub struct ProductPage {
    /// Document `<title>`.
    pub document_title: String,
    pub name: String,
    /// Primary image, or `None` for the placeholder element.
    pub image: Option<ImageView>,
    pub description: Option<String>,
    /// Canonical page URL.
    pub page_url: String,
    /// Native-scheme URI for the "Open in app" button.
    pub app_uri: String,
    pub app_button_label: String,
    pub show_app_button: bool,
    pub social: Option<SocialMeta>,
    /// Present when the page should try the app on load.
    pub redirect: Option<RedirectPlan>,
}

impl ProductPage {
    /// Assemble the page for `record`.
    #[must_use]
    pub fn build(config: &ShareConfig, id: &ProductIdentifier, record: &ProductRecord) -> Self {
        let options = config.page;
        let plan = RedirectPlan::new(
            id,
            &config.app_scheme,
            &config.public_base_url,
            config.redirect_timing,
        );
        let page_url = plan.fallback_url.clone();

        let image = primary_image(config, record).map(|src| ImageView {
            src: src.to_string(),
            alt: record.name.clone(),
        });

        let social = options.emit_social_metadata.then(|| {
            let description = record
                .description()
                .filter(|_| options.description_in_metadata)
                .map_or_else(|| tagline(&config.site_name), str::to_string);
            let image = image
                .as_ref()
                .map(|img| absolutize(&config.public_base_url, &img.src));

            SocialMeta {
                title: record.name.clone(),
                description,
                url: page_url.clone(),
                site_name: config.site_name.clone(),
                twitter_card: if image.is_some() {
                    "summary_large_image"
                } else {
                    "summary"
                },
                image,
            }
        });

        Self {
            document_title: format!("{} | {}", record.name, config.site_name),
            name: record.name.clone(),
            image,
            description: record
                .description()
                .filter(|_| options.show_description)
                .map(str::to_string),
            page_url,
            app_uri: plan.app_uri.clone(),
            app_button_label: format!("Open in {} App", config.site_name),
            show_app_button: options.show_app_button,
            social,
            redirect: options.auto_redirect_to_app.then_some(plan),
        }
    }
}

/// First image the allow-list accepts.
fn primary_image<'a>(config: &ShareConfig, record: &'a ProductRecord) -> Option<&'a str> {
    let src = record.primary_image()?.trim();
    if src.is_empty() {
        return None;
    }

    if config.images.allows(src) {
        Some(src)
    } else {
        tracing::warn!(image = %src, "Product image host is not in the allow-list");
        None
    }
}

fn tagline(site_name: &str) -> String {
    format!("Check out this product on {site_name}.")
}

/// Resolve an image path against the public base URL.
///
/// Link unfurlers cannot resolve relative URLs, so social metadata must be
/// absolute. Absolute http(s) URLs are returned unchanged.
#[must_use]
pub fn absolutize(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
