//! Host adapters: per-site selector tables driving every site-specific step.
//!
//! Tables are static data compiled once into [`HostAdapter`]s. Hostnames are
//! normalized and matched against each site's host patterns in declaration
//! order; an unknown host resolves to `None`, which leaves the engine inert.

use crate::dom::{Document, NodeId, PageMirror, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Static description of one site's rules
#[derive(Debug, Clone, Copy)]
pub struct AdapterSpec {
    pub key: &'static str,
    /// Glob patterns over the normalized hostname
    pub hosts: &'static [&'static str],
    pub promo: &'static [&'static str],
    pub motion: &'static [&'static str],
    pub layout: &'static [&'static str],
    pub tile: TileSpec,
    pub duration: &'static [&'static str],
    pub summary: SummarySpec,
}

#[derive(Debug, Clone, Copy)]
pub struct TileSpec {
    pub container: &'static [&'static str],
    /// Tried in order; the first with non-blank text wins
    pub title: &'static [&'static str],
    pub description: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct SummarySpec {
    pub target: &'static [&'static str],
    pub title: &'static [&'static str],
    pub description: &'static [&'static str],
    pub rows: &'static [&'static str],
}

/// Popups, modals and overlays removed on every site
const OVERLAY_PROMOS: &[&str] = &[
    "[class*='popup']",
    "[class*='modal']",
    "[id*='overlay']",
];

pub const BUILTIN_ADAPTERS: &[AdapterSpec] = &[
    AdapterSpec {
        key: "spotify",
        hosts: &["spotify.com", "*.spotify.com"],
        promo: &[
            "[data-testid='upsell-card']",
            "[data-testid='ad-slot']",
            "[data-testid='embedded-ad']",
            "[aria-label='Advertisement']",
            "[data-testid='premium-upsell-banner']",
        ],
        motion: &[
            "video",
            "[data-testid='canvas-video']",
            "[class*='animate']",
        ],
        layout: &[
            "[data-testid='now-playing-widget']",
            "[data-testid='buddy-feed']",
            "aside[aria-label='Now playing view']",
            "[data-testid='home-page'] section[aria-label='Recommended']",
        ],
        tile: TileSpec {
            container: &["[data-testid='tracklist-row']", "[data-encore-id='card']"],
            title: &[
                "[data-testid='internal-track-link']",
                "[data-encore-id='cardTitle']",
                "a[href*='/track/']",
            ],
            description: &["[data-encore-id='cardSubtitle']", "span[class*='subdued']"],
        },
        duration: &["[data-testid='tracklist-row'] [aria-colindex='5'] div"],
        summary: SummarySpec {
            target: &["[data-testid='playlist-page']", "[data-testid='album-page']"],
            title: &["[data-testid='entityTitle'] h1", "h1"],
            description: &["[data-testid='description']"],
            rows: &["[data-testid='tracklist-row']"],
        },
    },
    AdapterSpec {
        key: "youtube-music",
        hosts: &["music.youtube.com"],
        promo: &[
            "ytmusic-mealbar-promo-renderer",
            "ytmusic-statement-banner-renderer",
            "[class*='ad-slot']",
        ],
        motion: &["video", "ytmusic-carousel-shelf-renderer"],
        layout: &[
            "ytmusic-guide-renderer",
            "ytmusic-chip-cloud-renderer",
        ],
        tile: TileSpec {
            container: &[
                "ytmusic-responsive-list-item-renderer",
                "ytmusic-two-row-item-renderer",
            ],
            title: &[".title a", ".title"],
            description: &[".secondary-flex-columns", ".subtitle"],
        },
        duration: &["ytmusic-responsive-list-item-renderer .fixed-column"],
        summary: SummarySpec {
            target: &["ytmusic-detail-header-renderer", "ytmusic-responsive-header-renderer"],
            title: &["h2.title", ".title"],
            description: &[".description"],
            rows: &["ytmusic-responsive-list-item-renderer"],
        },
    },
    AdapterSpec {
        key: "soundcloud",
        hosts: &["soundcloud.com", "*.soundcloud.com"],
        promo: &[
            ".sidebarModule.promo",
            ".upsellBanner",
            "[class*='goPromo']",
            ".adSlot",
        ],
        motion: &["video", ".heroVideo", "[class*='animated']"],
        layout: &[".l-sidebar-right", ".sidebarModule"],
        tile: TileSpec {
            container: &[".soundList__item", ".trackList__item"],
            title: &[".soundTitle__title", ".trackItem__trackTitle"],
            description: &[".soundTitle__username", ".trackItem__username"],
        },
        duration: &[".trackItem__duration", ".playbackTimeline__duration span[aria-hidden='true']"],
        summary: SummarySpec {
            target: &[".listenDetails", ".l-listen-hero"],
            title: &[".soundTitle__title"],
            description: &[".truncatedAudioInfo__content"],
            rows: &[".trackList__item"],
        },
    },
    AdapterSpec {
        key: "apple-music",
        hosts: &["music.apple.com"],
        promo: &[".upsell-banner", "[data-testid='upsell-banner']", ".banner-promo"],
        motion: &["video", "amp-ambient-video"],
        layout: &[".navigation__scrollable-container", "[data-testid='now-playing-sidebar']"],
        tile: TileSpec {
            container: &["[data-testid='track-list-item']", ".product-lockup"],
            title: &["[data-testid='track-title']", ".product-lockup__title"],
            description: &["[data-testid='track-title-by-line']", ".product-lockup__subtitle"],
        },
        duration: &["[data-testid='track-duration']", "time"],
        summary: SummarySpec {
            target: &[".container-detail-header"],
            title: &["h1"],
            description: &["[data-testid='truncate-text']"],
            rows: &["[data-testid='track-list-item']"],
        },
    },
    AdapterSpec {
        key: "deezer",
        hosts: &["deezer.com", "*.deezer.com"],
        promo: &["[data-testid='ad-container']", ".conversion-banner", "[class*='upsell']"],
        motion: &["video", "[class*='animated-cover']"],
        layout: &["[data-testid='sidebar']", ".page-sidebar"],
        tile: TileSpec {
            container: &["[data-testid='track']", "[data-testid='card']"],
            title: &["[data-testid='title']", "a[data-testid='card-title']"],
            description: &["[data-testid='artist']", "[data-testid='card-subtitle']"],
        },
        duration: &["[data-testid='duration']"],
        summary: SummarySpec {
            target: &["[data-testid='masthead']"],
            title: &["h1"],
            description: &["[data-testid='masthead-description']"],
            rows: &["[data-testid='track']"],
        },
    },
];

/// Compiled rules for one site. Immutable once built.
#[derive(Debug, Clone)]
pub struct HostAdapter {
    pub key: String,
    pub promo: Vec<Selector>,
    pub motion: Vec<Selector>,
    pub layout: Vec<Selector>,
    pub tile_container: Vec<Selector>,
    pub tile_title: Vec<Selector>,
    pub tile_description: Vec<Selector>,
    pub duration: Vec<Selector>,
    pub summary_target: Vec<Selector>,
    pub summary_title: Vec<Selector>,
    pub summary_description: Vec<Selector>,
    pub summary_rows: Vec<Selector>,
}

fn compile(key: &str, group: &str, sources: &[&str]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|source| {
            Selector::parse(source)
                .map_err(|e| {
                    warn!("Skipping {} {} selector '{}': {}", key, group, source, e);
                    e
                })
                .ok()
        })
        .collect()
}

impl HostAdapter {
    pub fn from_spec(spec: &AdapterSpec) -> Self {
        let key = spec.key;
        let promo: Vec<&str> = spec.promo.iter().chain(OVERLAY_PROMOS).copied().collect();
        Self {
            key: key.to_string(),
            promo: compile(key, "promo", &promo),
            motion: compile(key, "motion", spec.motion),
            layout: compile(key, "layout", spec.layout),
            tile_container: compile(key, "tile", spec.tile.container),
            tile_title: compile(key, "tile title", spec.tile.title),
            tile_description: compile(key, "tile description", spec.tile.description),
            duration: compile(key, "duration", spec.duration),
            summary_target: compile(key, "summary target", spec.summary.target),
            summary_title: compile(key, "summary title", spec.summary.title),
            summary_description: compile(key, "summary description", spec.summary.description),
            summary_rows: compile(key, "summary rows", spec.summary.rows),
        }
    }

    /// Every element matching any selector of a group, in group then document order, without repeats
    pub fn select_all(doc: &Document, group: &[Selector]) -> Vec<NodeId> {
        Self::select_all_in(&doc.mirror(), group)
    }

    pub fn select_all_in(mirror: &PageMirror<'_>, group: &[Selector]) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut out: Vec<NodeId> = Vec::new();
        for selector in group {
            for id in mirror.select(selector) {
                if seen.insert(id) {
                    out.push(id);
                }
            }
        }
        out
    }

    /// First non-blank trimmed text in the page across fallback selectors
    pub fn first_text(doc: &Document, fallbacks: &[Selector]) -> Option<String> {
        let mirror = doc.mirror();
        fallbacks.iter().find_map(|selector| {
            mirror
                .select(selector)
                .first()
                .map(|id| collapse_whitespace(&doc.text_content(*id)))
                .filter(|text| !text.is_empty())
        })
    }

    /// First element matching any selector of the group, trying selectors in order
    pub fn first_match(doc: &Document, group: &[Selector]) -> Option<NodeId> {
        let mirror = doc.mirror();
        group
            .iter()
            .find_map(|selector| mirror.select(selector).first().copied())
    }
}

/// Fallback selectors resolved once against a mirror, for per-element lookups
#[derive(Debug, Default)]
pub struct TextFallbacks {
    matches: Vec<HashSet<NodeId>>,
}

impl TextFallbacks {
    pub fn resolve(mirror: &PageMirror<'_>, fallbacks: &[Selector]) -> Self {
        Self {
            matches: fallbacks.iter().map(|s| mirror.matching(s)).collect(),
        }
    }

    /// First non-blank trimmed text under `scope`, trying fallbacks in order
    pub fn first_within(&self, doc: &Document, scope: NodeId) -> Option<String> {
        let descendants = doc.descendants(scope);
        self.matches.iter().find_map(|matched| {
            descendants
                .iter()
                .find(|id| matched.contains(id))
                .map(|id| collapse_whitespace(&doc.text_content(*id)))
                .filter(|text| !text.is_empty())
        })
    }
}

/// Trim and collapse runs of whitespace to single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a hostname or URL: lowercase, no port, no trailing dot
pub fn normalize_host(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let host = if trimmed.contains("://") {
        url::Url::parse(trimmed).ok()?.host_str()?.to_string()
    } else {
        let bare = trimmed.split(['/', '?', '#']).next().unwrap_or(trimmed);
        bare.rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map(|(host, _)| host)
            .unwrap_or(bare)
            .to_string()
    };

    let host = host.trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

struct Entry {
    key: String,
    hosts: Vec<glob::Pattern>,
    adapter: Arc<HostAdapter>,
}

/// Maps hostnames to site adapters
pub struct AdapterRegistry {
    entries: Vec<Entry>,
}

impl AdapterRegistry {
    /// Registry with the built-in music-streaming sites
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for spec in BUILTIN_ADAPTERS {
            registry.register(spec.hosts, HostAdapter::from_spec(spec));
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an adapter for the given host patterns, after existing ones
    pub fn register(&mut self, hosts: &[&str], adapter: HostAdapter) {
        let patterns = hosts
            .iter()
            .filter_map(|pattern| {
                glob::Pattern::new(&pattern.to_lowercase())
                    .map_err(|e| {
                        warn!("Invalid host pattern '{}' for {}: {}", pattern, adapter.key, e);
                        e
                    })
                    .ok()
            })
            .collect();

        self.entries.push(Entry {
            key: adapter.key.clone(),
            hosts: patterns,
            adapter: Arc::new(adapter),
        });
    }

    /// Canonical site key for a hostname or URL
    pub fn site_key(&self, hostname: &str) -> Option<&str> {
        let host = normalize_host(hostname)?;
        self.entries
            .iter()
            .find(|entry| entry.hosts.iter().any(|p| p.matches(&host)))
            .map(|entry| entry.key.as_str())
    }

    /// Adapter for a hostname or URL; `None` for unsupported sites
    pub fn resolve(&self, hostname: &str) -> Option<Arc<HostAdapter>> {
        let host = normalize_host(hostname)?;
        let adapter = self
            .entries
            .iter()
            .find(|entry| entry.hosts.iter().any(|p| p.matches(&host)))
            .map(|entry| Arc::clone(&entry.adapter));

        match &adapter {
            Some(a) => debug!("Host {} resolved to adapter {}", host, a.key),
            None => debug!("Host {} has no adapter", host),
        }
        adapter
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_compile() {
        for spec in BUILTIN_ADAPTERS {
            let adapter = HostAdapter::from_spec(spec);
            assert_eq!(adapter.promo.len(), spec.promo.len() + OVERLAY_PROMOS.len(), "{}", spec.key);
            assert_eq!(adapter.motion.len(), spec.motion.len(), "{}", spec.key);
            assert_eq!(adapter.layout.len(), spec.layout.len(), "{}", spec.key);
            assert_eq!(adapter.tile_container.len(), spec.tile.container.len(), "{}", spec.key);
            assert_eq!(adapter.tile_title.len(), spec.tile.title.len(), "{}", spec.key);
            assert_eq!(adapter.duration.len(), spec.duration.len(), "{}", spec.key);
            assert_eq!(adapter.summary_target.len(), spec.summary.target.len(), "{}", spec.key);
            assert_eq!(adapter.summary_rows.len(), spec.summary.rows.len(), "{}", spec.key);
        }
    }

    #[test]
    fn test_subdomains_collapse_to_site_key() {
        let registry = AdapterRegistry::new();
        assert_eq!(registry.site_key("open.spotify.com"), Some("spotify"));
        assert_eq!(registry.site_key("spotify.com"), Some("spotify"));
        assert_eq!(registry.site_key("m.soundcloud.com"), Some("soundcloud"));
        assert_eq!(registry.site_key("www.deezer.com"), Some("deezer"));
        assert_eq!(registry.site_key("music.youtube.com"), Some("youtube-music"));
    }

    #[test]
    fn test_urls_and_ports_normalize() {
        let registry = AdapterRegistry::new();
        assert_eq!(
            registry.site_key("https://open.spotify.com/playlist/37i9dQZF1DX3rxVfibe1L0?si=abc"),
            Some("spotify")
        );
        assert_eq!(registry.site_key("OPEN.Spotify.com."), Some("spotify"));
        assert_eq!(registry.site_key("music.apple.com:443"), Some("apple-music"));
    }

    #[test]
    fn test_unknown_hosts_are_inert() {
        let registry = AdapterRegistry::new();
        assert!(registry.resolve("www.youtube.com").is_none());
        assert!(registry.resolve("example.com").is_none());
        assert!(registry.resolve("notspotify.com").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_invalid_selectors_are_skipped() {
        let selectors = compile("test", "promo", &["div", "!!div", ".ok"]);
        assert_eq!(selectors.len(), 2);
    }

    #[test]
    fn test_register_custom_adapter() {
        let mut registry = AdapterRegistry::empty();
        let mut adapter = HostAdapter::from_spec(&BUILTIN_ADAPTERS[0]);
        adapter.key = "local".to_string();
        registry.register(&["localhost"], adapter);

        assert_eq!(registry.site_key("http://localhost:8080/"), Some("local"));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["local"]);
    }

    #[test]
    fn test_text_fallbacks() {
        let mut doc = Document::new();
        let tile = doc.create_element("div");
        let secondary = doc.create_element("span");
        doc.set_attr(secondary, "class", "secondary");
        let text = doc.create_text("  Heartbreak \n Anthem ");
        doc.append_child(doc.body(), tile);
        doc.append_child(tile, secondary);
        doc.append_child(secondary, text);

        let fallbacks = vec![
            Selector::parse(".primary").unwrap(),
            Selector::parse(".secondary").unwrap(),
        ];
        let mirror = doc.mirror();
        assert_eq!(
            TextFallbacks::resolve(&mirror, &fallbacks).first_within(&doc, tile),
            Some("Heartbreak Anthem".to_string())
        );
        assert_eq!(
            TextFallbacks::resolve(&mirror, &fallbacks[..1]).first_within(&doc, tile),
            None
        );
    }

    #[test]
    fn test_select_all_keeps_group_order_without_repeats() {
        let mut doc = Document::new();
        let banner = doc.create_element("div");
        doc.set_attr(banner, "class", "upsell banner");
        let modal = doc.create_element("div");
        doc.set_attr(modal, "role", "dialog");
        doc.append_child(doc.body(), banner);
        doc.append_child(doc.body(), modal);

        let group = vec![
            Selector::parse("[role='dialog']").unwrap(),
            Selector::parse(".banner").unwrap(),
            Selector::parse(".upsell").unwrap(),
        ];
        assert_eq!(HostAdapter::select_all(&doc, &group), vec![modal, banner]);
    }
}
