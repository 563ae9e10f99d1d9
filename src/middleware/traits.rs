use crate::gate::{Granted, LinkSent};

/// Consumer-provided page rendering.
///
/// Every method returns a complete HTML document. Messages passed in are
/// plain text and must be escaped by the implementation.
///
/// # Example
///
/// ```rust,ignore
/// struct MyViews { templates: Tera }
///
/// impl Views for MyViews {
///     fn landing(&self, error: Option<&str>) -> String {
///         let mut ctx = tera::Context::new();
///         ctx.insert("error", &error);
///         self.templates.render("index.html", &ctx).unwrap_or_default()
///     }
///     // ...
/// }
/// ```
pub trait Views: Send + Sync + 'static {
    /// Login form, with the pending error message if there is one.
    fn landing(&self, error: Option<&str>) -> String;

    /// Acknowledgment that a link was emailed.
    fn link_sent(&self, sent: &LinkSent) -> String;

    /// The protected view, shown only for an overall allow.
    fn resource(&self, granted: &Granted) -> String;
}
