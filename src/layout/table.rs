use std::collections::BTreeMap;

use crate::foundation::{
    core::{BorderEdges, Canvas},
    error::{MixError, MixResult},
};

/// Geometry sink driven by layout application.
///
/// Implemented by [`crate::MediaSource`]; anything that can be positioned on the canvas can be
/// laid out.
pub trait Placeable {
    /// Absolute position on the canvas.
    fn set_position(&self, x: i32, y: i32);
    /// Picture size in canvas units.
    fn set_size(&self, width: u32, height: u32);
    /// Framing inset for every edge in `edges`.
    fn set_border(&self, edges: BorderEdges, value: i32);
}

/// Geometry of one source: position, size and border thickness per edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LayoutSlot {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    #[serde(default)]
    border_top: i32,
    #[serde(default)]
    border_right: i32,
    #[serde(default)]
    border_bottom: i32,
    #[serde(default)]
    border_left: i32,
}

impl LayoutSlot {
    /// Slot without borders.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ..Self::default()
        }
    }

    /// Slot with an explicit border per edge.
    #[allow(clippy::too_many_arguments)]
    pub fn with_borders(
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        top: i32,
        right: i32,
        bottom: i32,
        left: i32,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            border_top: top,
            border_right: right,
            border_bottom: bottom,
            border_left: left,
        }
    }

    /// Slot whose `horizontal` border applies to left and right, `vertical` to top and bottom.
    pub fn with_symmetric_borders(
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        horizontal: i32,
        vertical: i32,
    ) -> Self {
        Self::with_borders(x, y, width, height, vertical, horizontal, vertical, horizontal)
    }

    /// Position `(x, y)`.
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Size `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Border thickness as `[top, right, bottom, left]`.
    pub fn borders(&self) -> [i32; 4] {
        [
            self.border_top,
            self.border_right,
            self.border_bottom,
            self.border_left,
        ]
    }

    /// Push this slot's geometry onto `target`.
    ///
    /// Borders are pushed negated: the framing node treats a positive value as a crop, so a
    /// configured thickness `b` becomes `-b`.
    pub fn place(&self, target: &impl Placeable) {
        target.set_position(self.x, self.y);
        target.set_size(self.width, self.height);
        target.set_border(BorderEdges::LEFT, -self.border_left);
        target.set_border(BorderEdges::RIGHT, -self.border_right);
        target.set_border(BorderEdges::TOP, -self.border_top);
        target.set_border(BorderEdges::BOTTOM, -self.border_bottom);
    }
}

/// Slots for one source count; slot `i` belongs to the `i`-th attached source.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LayoutRule {
    slots: Vec<LayoutSlot>,
}

impl LayoutRule {
    /// Empty rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot (builder style).
    pub fn with_slot(mut self, slot: LayoutSlot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Append a slot.
    pub fn add_slot(&mut self, slot: LayoutSlot) {
        self.slots.push(slot);
    }

    /// Slots in source order.
    pub fn slots(&self) -> &[LayoutSlot] {
        &self.slots
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` when the rule has no slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Near-square grid of `count` equal cells covering `canvas`, filled row by row.
    pub fn grid(canvas: Canvas, count: usize) -> Self {
        let mut rule = Self::new();
        if count == 0 {
            return rule;
        }
        let mut cols = 1usize;
        while cols * cols < count {
            cols += 1;
        }
        let rows = count.div_ceil(cols);
        let cell_w = canvas.width / cols as u32;
        let cell_h = canvas.height / rows as u32;
        for idx in 0..count {
            let col = (idx % cols) as u32;
            let row = (idx / cols) as u32;
            rule.add_slot(LayoutSlot::new(
                (col * cell_w) as i32,
                (row * cell_h) as i32,
                cell_w,
                cell_h,
            ));
        }
        rule
    }
}

/// Layout table: canvas plus one rule per distinct source count.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawLayout")]
pub struct Layout {
    canvas: Canvas,
    rules: BTreeMap<usize, LayoutRule>,
}

#[derive(serde::Deserialize)]
struct RawLayout {
    canvas: Canvas,
    #[serde(default)]
    rules: BTreeMap<usize, LayoutRule>,
}

impl TryFrom<RawLayout> for Layout {
    type Error = MixError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        let mut layout = Layout::new(raw.canvas);
        for (count, rule) in raw.rules {
            layout.add_rule(count, rule)?;
        }
        Ok(layout)
    }
}

impl Layout {
    /// Empty layout for `canvas`.
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            rules: BTreeMap::new(),
        }
    }

    /// Layout holding [`LayoutRule::grid`] rules for every count in `1..=max_sources`.
    pub fn uniform_grid(canvas: Canvas, max_sources: usize) -> Self {
        let rules = (1..=max_sources)
            .map(|n| (n, LayoutRule::grid(canvas, n)))
            .collect();
        Self { canvas, rules }
    }

    /// Canvas this layout was authored for.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Register the rule used when exactly `count` sources are attached.
    ///
    /// The rule must carry exactly `count` slots; a previous rule for the same count is
    /// replaced.
    pub fn add_rule(&mut self, count: usize, rule: LayoutRule) -> MixResult<()> {
        if rule.len() != count {
            return Err(MixError::validation(format!(
                "layout rule for {count} sources has {} slots",
                rule.len()
            )));
        }
        self.rules.insert(count, rule);
        Ok(())
    }

    /// Builder form of [`Layout::add_rule`].
    pub fn with_rule(mut self, count: usize, rule: LayoutRule) -> MixResult<Self> {
        self.add_rule(count, rule)?;
        Ok(self)
    }

    /// Source counts with a registered rule, ascending.
    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.rules.keys().copied()
    }

    /// Rule registered for `count` sources.
    pub fn resolve(&self, count: usize) -> MixResult<&LayoutRule> {
        self.rules
            .get(&count)
            .ok_or(MixError::LayoutResolution { count })
    }

    /// Resolve the rule for `targets.len()` and place slot `i` on target `i`.
    ///
    /// Nothing is touched when no rule matches.
    pub fn apply<P: Placeable>(&self, targets: &[P]) -> MixResult<()> {
        let rule = self.resolve(targets.len())?;
        apply_rule(rule, targets)
    }
}

/// Place `rule.slots()[i]` on `targets[i]` for every target.
pub fn apply_rule<P: Placeable>(rule: &LayoutRule, targets: &[P]) -> MixResult<()> {
    if rule.len() != targets.len() {
        return Err(MixError::validation(format!(
            "layout rule has {} slots for {} sources",
            rule.len(),
            targets.len()
        )));
    }
    for (slot, target) in rule.slots().iter().zip(targets) {
        slot.place(target);
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/layout/table.rs"]
mod tests;
