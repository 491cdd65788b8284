//! Shaders and their per-stage uniform block layout.

use crate::pool::SlotIndex;
use crate::types::{MAX_SHADERSTAGE_UBS, ShaderStage};

/// Source and interface of one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageDescriptor {
    /// Stage-specific source. Falls back to the shader's common source.
    pub source: Option<String>,
    /// Entry point function name.
    pub entry: String,
    /// Byte sizes of the stage's uniform blocks, by block index.
    pub uniform_blocks: Vec<u32>,
}

impl ShaderStageDescriptor {
    fn new(entry: &str) -> Self {
        Self {
            source: None,
            entry: entry.to_owned(),
            uniform_blocks: Vec::new(),
        }
    }
}

/// Descriptor for creating a shader.
///
/// Either one common source holds both entry points, or each stage brings its
/// own source.
///
/// # Example
///
/// ```
/// use redlilium_gpu::{ShaderDescriptor, ShaderStage};
///
/// let desc = ShaderDescriptor::from_source("/* vs_main, fs_main */")
///     .with_uniform_block(ShaderStage::Vertex, 64)
///     .with_label("sprite");
///
/// assert_eq!(desc.stage(ShaderStage::Vertex).uniform_blocks, vec![64]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDescriptor {
    pub label: Option<String>,
    pub source: Option<String>,
    pub vertex: ShaderStageDescriptor,
    pub fragment: ShaderStageDescriptor,
}

impl ShaderDescriptor {
    /// Default vertex entry point.
    pub const DEFAULT_VERTEX_ENTRY: &'static str = "vs_main";
    /// Default fragment entry point.
    pub const DEFAULT_FRAGMENT_ENTRY: &'static str = "fs_main";

    /// Shader with both stages in one source.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            label: None,
            source: Some(source.into()),
            vertex: ShaderStageDescriptor::new(Self::DEFAULT_VERTEX_ENTRY),
            fragment: ShaderStageDescriptor::new(Self::DEFAULT_FRAGMENT_ENTRY),
        }
    }

    /// Shader with a separate source per stage.
    pub fn from_stages(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        let mut desc = Self {
            label: None,
            source: None,
            vertex: ShaderStageDescriptor::new(Self::DEFAULT_VERTEX_ENTRY),
            fragment: ShaderStageDescriptor::new(Self::DEFAULT_FRAGMENT_ENTRY),
        };
        desc.vertex.source = Some(vertex.into());
        desc.fragment.source = Some(fragment.into());
        desc
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Override both entry point names.
    pub fn with_entry_points(mut self, vertex: &str, fragment: &str) -> Self {
        self.vertex.entry = vertex.to_owned();
        self.fragment.entry = fragment.to_owned();
        self
    }

    /// Declare the next uniform block of `stage` with its size in bytes.
    pub fn with_uniform_block(mut self, stage: ShaderStage, size: u32) -> Self {
        self.stage_mut(stage).uniform_blocks.push(size);
        self
    }

    pub fn stage(&self, stage: ShaderStage) -> &ShaderStageDescriptor {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    fn stage_mut(&mut self, stage: ShaderStage) -> &mut ShaderStageDescriptor {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        }
    }

    /// Source compiled for `stage`: its own, else the common one.
    pub fn stage_source(&self, stage: ShaderStage) -> Option<&str> {
        self.stage(stage)
            .source
            .as_deref()
            .or(self.source.as_deref())
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        for stage in ShaderStage::ALL {
            let desc = self.stage(stage);
            if self.stage_source(stage).is_none() {
                return Err(format!("{stage:?} stage has no source"));
            }
            if desc.entry.is_empty() {
                return Err(format!("{stage:?} stage has no entry point"));
            }
            if desc.uniform_blocks.len() > MAX_SHADERSTAGE_UBS {
                return Err(format!(
                    "{stage:?} stage declares {} uniform blocks, at most {MAX_SHADERSTAGE_UBS} are supported",
                    desc.uniform_blocks.len()
                ));
            }
            if desc.uniform_blocks.contains(&0) {
                return Err(format!("{stage:?} stage declares an empty uniform block"));
            }
        }
        Ok(())
    }
}

/// Native objects of one shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShaderStageObjects {
    /// Library compiled from the stage's own source.
    pub library: Option<SlotIndex>,
    /// Entry point function object, on drivers that have one.
    pub function: Option<SlotIndex>,
}

/// A logical shader.
#[derive(Debug)]
pub struct Shader {
    /// Library compiled from the common source.
    pub(crate) library: Option<SlotIndex>,
    pub(crate) stages: [ShaderStageObjects; 2],
    pub(crate) entries: [String; 2],
    pub(crate) uniform_blocks: [Vec<u32>; 2],
}

impl Shader {
    /// Declared size of a uniform block, if the block exists.
    pub fn uniform_block_size(&self, stage: ShaderStage, index: usize) -> Option<u32> {
        self.uniform_blocks[stage.index()].get(index).copied()
    }

    pub fn uniform_blocks(&self, stage: ShaderStage) -> &[u32] {
        &self.uniform_blocks[stage.index()]
    }

    pub fn entry(&self, stage: ShaderStage) -> &str {
        &self.entries[stage.index()]
    }

    /// Library holding the code of `stage`.
    pub(crate) fn stage_library(&self, stage: ShaderStage) -> Option<SlotIndex> {
        self.stages[stage.index()].library.or(self.library)
    }

    pub(crate) fn stage_function(&self, stage: ShaderStage) -> Option<SlotIndex> {
        self.stages[stage.index()].function
    }

    /// Every native object slot, present or not.
    pub(crate) fn native_slots(&self) -> [Option<SlotIndex>; 5] {
        let [vs, fs] = self.stages;
        [
            self.library,
            vs.library,
            vs.function,
            fs.library,
            fs.function,
        ]
    }
}
