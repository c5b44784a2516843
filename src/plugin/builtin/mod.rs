//! Built-in Plugin Declarations
//!
//! The first-party feature modules shipped with the CMS. Only their identity,
//! permissions and settings live here; the feature code itself belongs to the
//! host application.

use std::any::Any;
use std::path::Path;

use log::info;
use serde_json::{json, Value};

use crate::events::{studly_case, PLUGIN_BOOTED};
use crate::plugin::classmap::{ClassDecl, ClassMap, ClassTable};
use crate::plugin::compatibility::CORE_VERSION;
use crate::plugin::discovery::DEFAULT_NAMESPACE;
use crate::plugin::error::PluginResult;
use crate::plugin::metadata::{PluginMeta, CORE_DEPENDENCY};
use crate::plugin::traits::{BootContext, ConfigField, FieldType, Plugin};

const AUTHOR: &str = "GameCMS";

/// Static description of one bundled plugin
pub struct Bundle {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
    pub dependencies: &'static [(&'static str, &'static str)],
    fields: fn() -> Vec<ConfigField>,
}

impl Bundle {
    pub fn meta(&self) -> PluginMeta {
        let mut meta = PluginMeta::new(self.id, self.name, CORE_VERSION)
            .with_description(self.description)
            .with_author(AUTHOR)
            .with_dependency(CORE_DEPENDENCY, format!(">={}", CORE_VERSION))
            .with_permissions(self.permissions.iter().copied());
        for (id, constraint) in self.dependencies {
            meta = meta.with_dependency(*id, *constraint);
        }
        meta
    }

    /// Main class name under the default namespace
    pub fn class_name(&self) -> String {
        let name = studly_case(self.id);
        format!("{}\\{}\\{}", DEFAULT_NAMESPACE, name, name)
    }
}

pub static BUNDLES: [Bundle; 8] = [
    Bundle {
        id: "blog",
        name: "Blog",
        description: "News posts with categories, tags and comments",
        permissions: &["blog.posts.manage", "blog.categories.manage", "blog.comments.moderate"],
        dependencies: &[],
        fields: blog_fields,
    },
    Bundle {
        id: "shop",
        name: "Shop",
        description: "Store items, carts and orders",
        permissions: &["shop.items.manage", "shop.orders.view", "shop.orders.refund"],
        dependencies: &[],
        fields: shop_fields,
    },
    Bundle {
        id: "votes",
        name: "Votes",
        description: "Vote site listings and vote rewards",
        permissions: &["votes.sites.manage", "votes.rewards.manage"],
        dependencies: &[("shop", "*")],
        fields: votes_fields,
    },
    Bundle {
        id: "notifications",
        name: "Notifications",
        description: "Notification channels and message templates",
        permissions: &["notifications.channels.manage", "notifications.templates.manage"],
        dependencies: &[],
        fields: notification_fields,
    },
    Bundle {
        id: "tickets",
        name: "Tickets",
        description: "Support tickets with categories",
        permissions: &["tickets.view", "tickets.reply", "tickets.categories.manage"],
        dependencies: &[("notifications", "*")],
        fields: ticket_fields,
    },
    Bundle {
        id: "docs",
        name: "Documentation",
        description: "Markdown documentation pages",
        permissions: &["docs.manage"],
        dependencies: &[],
        fields: docs_fields,
    },
    Bundle {
        id: "legal",
        name: "Legal",
        description: "Terms of service, privacy policy and imprint pages",
        permissions: &["legal.manage"],
        dependencies: &[],
        fields: no_fields,
    },
    Bundle {
        id: "translations",
        name: "Translations",
        description: "Editable interface translations",
        permissions: &["translations.manage"],
        dependencies: &[],
        fields: translation_fields,
    },
];

fn blog_fields() -> Vec<ConfigField> {
    vec![
        ConfigField::new("posts_per_page", "Posts per page", FieldType::Number, json!(10)),
        ConfigField::new("comments_enabled", "Allow comments", FieldType::Boolean, json!(true)),
    ]
}

fn shop_fields() -> Vec<ConfigField> {
    vec![
        ConfigField::new("currency", "Currency", FieldType::Select, json!("EUR")),
        ConfigField::new("tax_rate", "Tax rate (%)", FieldType::Number, json!(0))
            .with_description("Applied on top of item prices"),
    ]
}

fn votes_fields() -> Vec<ConfigField> {
    vec![ConfigField::new("cooldown_hours", "Hours between votes", FieldType::Number, json!(24))]
}

fn notification_fields() -> Vec<ConfigField> {
    vec![ConfigField::new("from_address", "Sender address", FieldType::Text, json!(""))]
}

fn ticket_fields() -> Vec<ConfigField> {
    vec![
        ConfigField::new("auto_close_days", "Close inactive tickets after (days)", FieldType::Number, json!(7)),
        ConfigField::new("discord_webhook", "Discord webhook", FieldType::Url, Value::Null),
    ]
}

fn docs_fields() -> Vec<ConfigField> {
    vec![ConfigField::new("source_dir", "Documentation directory", FieldType::Text, json!("docs"))]
}

fn translation_fields() -> Vec<ConfigField> {
    vec![ConfigField::new("default_locale", "Default locale", FieldType::Text, json!("en"))]
}

fn no_fields() -> Vec<ConfigField> {
    Vec::new()
}

/// A bundled feature module
pub struct BundledPlugin {
    bundle: &'static Bundle,
}

impl BundledPlugin {
    pub fn new(bundle: &'static Bundle) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &'static Bundle {
        self.bundle
    }
}

impl Plugin for BundledPlugin {
    fn boot(&self, ctx: &BootContext<'_>) -> PluginResult<()> {
        info!("Booting {} {}", self.bundle.name, ctx.meta.version);
        ctx.events.dispatch(
            PLUGIN_BOOTED,
            &json!({ "plugin": ctx.plugin_id, "version": ctx.meta.version }),
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        (self.bundle.fields)()
    }
}

/// Look up a bundle by id
pub fn bundle(id: &str) -> Option<&'static Bundle> {
    BUNDLES.iter().find(|b| b.id == id)
}

/// Ids of every bundled plugin
pub fn get_builtin_plugins() -> Vec<&'static str> {
    BUNDLES.iter().map(|b| b.id).collect()
}

/// Class declarations for every bundled plugin
pub fn class_table() -> ClassTable {
    let mut table = ClassTable::new();
    for bundle in BUNDLES.iter() {
        table.declare(&bundle.class_name(), ClassDecl::plugin(bundle.meta(), move || BundledPlugin::new(bundle)));
    }
    table
}

/// Class map for bundled plugins installed as `<plugins_dir>/<id>/src/<Name>.php`
pub fn class_map(plugins_dir: &Path) -> ClassMap {
    let mut map = ClassMap::new();
    for bundle in BUNDLES.iter() {
        let file = plugins_dir
            .join(bundle.id)
            .join("src")
            .join(format!("{}.php", studly_case(bundle.id)));
        map.insert(bundle.class_name(), file);
    }
    map
}
