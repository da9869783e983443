use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use log::error;

/// Selects which cache (if any) keeps the result of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    /// Every resolution runs locate, load and post-process again.
    None,
    /// The entry stays until it is deleted or the cache is cleared. Every fetch hands out the same
    /// reference.
    Unmanaged,
    /// The canonical value never leaves the cache, consumers get clones. The entry is reclaimed
    /// once all clones have been dropped.
    CloneTracked,
    /// Only a weak reference is kept, the entry lives as long as somebody holds the asset.
    Weak,
}

/// Selects the processor used for post-processing and cloning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    None,
    /// Clones through [`crate::asset::Asset::clone_asset`].
    Cloneable,
    Named(&'static str),
}

/// Key flavours. Texture flags and the audio stream flag take part in key identity, models and
/// materials only differ from plain keys in their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFlavor {
    Plain,
    Texture { flip_y: bool, generate_mips: bool },
    Model,
    Material,
    Audio { stream: bool },
}

impl KeyFlavor {
    fn identity(self) -> KeyFlavor {
        match self {
            KeyFlavor::Model | KeyFlavor::Material => KeyFlavor::Plain,
            other => other,
        }
    }
}

/// Identity of a requested asset. The name is normalized on construction, the extension and
/// folder are derived from it.
#[derive(Clone)]
pub struct AssetKey {
    name: Arc<str>,
    extension: String,
    folder: OnceLock<String>,
    cache: CachePolicy,
    processor: ProcessorKind,
    flavor: KeyFlavor,
}

impl AssetKey {
    pub fn new(name: &str) -> Self {
        let name = reduce_path(name);
        let extension = extension_of(&name);
        Self {
            name: name.into(),
            extension,
            folder: OnceLock::new(),
            cache: CachePolicy::Unmanaged,
            processor: ProcessorKind::None,
            flavor: KeyFlavor::Plain,
        }
    }

    pub fn texture(name: &str) -> Self {
        Self::new(name)
            .with_flavor(KeyFlavor::Texture {
                flip_y: false,
                generate_mips: false,
            })
            .with_cache(CachePolicy::CloneTracked)
            .with_processor(ProcessorKind::Cloneable)
    }

    pub fn model(name: &str) -> Self {
        Self::new(name)
            .with_flavor(KeyFlavor::Model)
            .with_cache(CachePolicy::CloneTracked)
            .with_processor(ProcessorKind::Cloneable)
    }

    pub fn material(name: &str) -> Self {
        Self::new(name)
            .with_flavor(KeyFlavor::Material)
            .with_cache(CachePolicy::CloneTracked)
            .with_processor(ProcessorKind::Cloneable)
    }

    /// Streamed audio is never cached, each consumer needs its own stream.
    pub fn audio(name: &str, stream: bool) -> Self {
        let cache = match stream {
            true => CachePolicy::None,
            false => CachePolicy::Unmanaged,
        };
        Self::new(name)
            .with_flavor(KeyFlavor::Audio { stream })
            .with_cache(cache)
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_processor(mut self, processor: ProcessorKind) -> Self {
        self.processor = processor;
        self
    }

    fn with_flavor(mut self, flavor: KeyFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Only has an effect on texture keys.
    pub fn with_flip_y(mut self, flip: bool) -> Self {
        if let KeyFlavor::Texture { flip_y, .. } = &mut self.flavor {
            *flip_y = flip;
        }
        self
    }

    /// Only has an effect on texture keys.
    pub fn with_generate_mips(mut self, mips: bool) -> Self {
        if let KeyFlavor::Texture { generate_mips, .. } = &mut self.flavor {
            *generate_mips = mips;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Everything up to and including the last `/`, empty for top level names.
    pub fn folder(&self) -> &str {
        self.folder.get_or_init(|| match self.name.rfind('/') {
            Some(idx) => self.name[..=idx].to_string(),
            None => String::new(),
        })
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    pub fn processor(&self) -> &ProcessorKind {
        &self.processor
    }

    pub fn flavor(&self) -> KeyFlavor {
        self.flavor
    }

    /// Key for a dependency that is referenced relative to this asset's folder, keeping the
    /// plain defaults.
    pub fn sibling(&self, name: &str) -> AssetKey {
        AssetKey::new(&format!("{}{}", self.folder(), name))
    }
}

impl PartialEq for AssetKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.flavor.identity() == other.flavor.identity()
    }
}

impl Eq for AssetKey {}

impl Hash for AssetKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.flavor.identity().hash(state);
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.flavor {
            KeyFlavor::Texture {
                flip_y,
                generate_mips,
            } if flip_y || generate_mips => {
                write!(f, "{}", self.name)?;
                if flip_y {
                    write!(f, " (Flipped)")?;
                }
                if generate_mips {
                    write!(f, " (Mipmapped)")?;
                }
                Ok(())
            }
            _ => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Debug for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetKey")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .field("cache", &self.cache)
            .field("processor", &self.processor)
            .field("flavor", &self.flavor)
            .finish()
    }
}

/// Resolves `.` and `..` segments and strips leading and duplicate separators.
/// `..` segments that would escape the root are kept, so locators can reject them.
pub fn reduce_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    error!("Asset path \"{path}\" is outside the asset root");
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    segments.iter().join("/")
}

/// Lowercase extension of the file name. For `.xml` files with a secondary extension, such as
/// `model.mesh.xml`, both are kept (`mesh.xml`).
pub fn extension_of(name: &str) -> String {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let lower = file_name.to_ascii_lowercase();

    let Some(mut idx) = lower.rfind('.') else {
        return String::new();
    };

    if lower.ends_with(".xml") {
        if let Some(secondary) = lower[..idx].rfind('.') {
            idx = secondary;
        }
    }

    if idx == 0 || idx == lower.len() - 1 {
        String::new()
    } else {
        lower[idx + 1..].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn path_reduction() {
        assert_eq!(reduce_path("Models/./Teapot/../Ninja/Ninja.mesh.xml"), "Models/Ninja/Ninja.mesh.xml");
        assert_eq!(reduce_path("/Textures//Sky.dds"), "Textures/Sky.dds");
        assert_eq!(reduce_path("a/b/../../c"), "c");
        assert_eq!(reduce_path("../outside.txt"), "../outside.txt");
        assert_eq!(reduce_path("plain.txt"), "plain.txt");
    }

    #[test]
    fn extensions() {
        assert_eq!(extension_of("Textures/Sky.DDS"), "dds");
        assert_eq!(extension_of("Models/Ninja.mesh.xml"), "mesh.xml");
        assert_eq!(extension_of("scene.XML"), "xml");
        assert_eq!(extension_of("noextension"), "");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of(".hidden"), "");
        assert_eq!(extension_of("dir.v2/readme"), "");
    }

    #[test]
    fn derived_fields() {
        let key = AssetKey::new("./Models/../Models/Teapot/Teapot.obj");
        assert_eq!(key.name(), "Models/Teapot/Teapot.obj");
        assert_eq!(key.extension(), "obj");
        assert_eq!(key.folder(), "Models/Teapot/");
        assert_eq!(AssetKey::new("top.txt").folder(), "");
        assert_eq!(key.sibling("Teapot.mtl").name(), "Models/Teapot/Teapot.mtl");
    }

    #[test]
    fn identity() {
        assert_eq!(AssetKey::new("a/b.txt"), AssetKey::new("/a/./b.txt"));
        // policy tags do not take part in equality
        assert_eq!(
            AssetKey::new("a.txt"),
            AssetKey::new("a.txt").with_cache(CachePolicy::None)
        );

        // models and materials are plain keys with other defaults
        assert_eq!(AssetKey::model("Models/a.obj"), AssetKey::new("Models/a.obj"));
        assert_eq!(AssetKey::material("Models/a.obj"), AssetKey::model("Models/a.obj"));
        assert_ne!(AssetKey::audio("a.ogg", true), AssetKey::audio("a.ogg", false));
        assert_ne!(AssetKey::texture("sky.png"), AssetKey::new("sky.png"));

        let flipped = AssetKey::texture("sky.png").with_flip_y(true);
        assert_ne!(flipped, AssetKey::texture("sky.png"));
        assert_eq!(flipped, AssetKey::texture("sky.png").with_flip_y(true));

        let set: HashSet<AssetKey> = [
            AssetKey::texture("sky.png"),
            AssetKey::texture("sky.png").with_generate_mips(true),
            AssetKey::texture("sky.png"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);

        let plain: HashSet<AssetKey> = [AssetKey::new("tree.obj"), AssetKey::model("tree.obj")]
            .into_iter()
            .collect();
        assert_eq!(plain.len(), 1);
    }

    #[test]
    fn key_defaults() {
        assert_eq!(AssetKey::new("x.txt").cache_policy(), CachePolicy::Unmanaged);
        assert_eq!(AssetKey::model("x.obj").cache_policy(), CachePolicy::CloneTracked);
        assert_eq!(AssetKey::model("x.obj").processor(), &ProcessorKind::Cloneable);
        assert_eq!(AssetKey::audio("x.ogg", true).cache_policy(), CachePolicy::None);
        assert_eq!(AssetKey::audio("x.ogg", false).cache_policy(), CachePolicy::Unmanaged);
        assert_eq!(
            AssetKey::texture("x.png").with_flip_y(true).to_string(),
            "x.png (Flipped)"
        );
    }
}
