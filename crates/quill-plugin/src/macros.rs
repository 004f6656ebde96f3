//! Convenience macros for plugin development.

/// Builds a [`PluginConfig`](crate::plugin::PluginConfig).
///
/// # Example
/// ```rust,ignore
/// let config = plugin_config!(
///     id: "seo",
///     name: "SEO Tools",
///     version: "1.2.0",
///     description: "Meta tags and sitemaps",
///     author: "Quill",
///     settings: [
///         SettingDeclaration::new("site_name", SettingKind::String).required(),
///     ]
/// );
/// ```
#[macro_export]
macro_rules! plugin_config {
    (
        id: $id:expr,
        name: $name:expr,
        version: $version:expr
        $(, description: $desc:expr)?
        $(, author: $author:expr)?
        $(, settings: [ $($setting:expr),* $(,)? ])?
        $(,)?
    ) => {{
        #[allow(unused_mut)]
        let mut config = $crate::plugin::PluginConfig::new($id, $name, $version);
        $( config.description = $desc.to_string(); )?
        $( config.author = $author.to_string(); )?
        $( $( config.settings.push($setting); )* )?
        config
    }};
}
