//! The product-variant dispatch table.
//!
//! Every supported variant of the target application family is described by
//! a static [`ControlMap`]: the signature its main window carries and the
//! queries that locate the controls the engine drives. The maps are data,
//! not behavior; supporting a new variant means adding an enum entry and a
//! table row, nothing else.

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::locator::ControlQuery;

/// A distinguishable product generation of the target application family.
///
/// Signatures are checked in declaration order, so the more specific title
/// patterns must come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum Variant {
    /// Second-generation studio editor. Exports directly to its configured
    /// destination without raising a save dialog.
    Studio,
    /// The extended edition of the first-generation editor.
    Ex,
    /// First-generation editor.
    Classic,
}

/// Window and control signatures for one variant.
pub struct ControlMap {
    /// Substring the main window title must contain.
    pub title_pattern: &'static str,
    /// Window class of the main window, for variants that have a stable one.
    pub window_class: Option<&'static str>,
    /// The talk-text edit control.
    pub talk_text: ControlQuery,
    /// The button that starts synthesis and export.
    pub save_button: ControlQuery,
    /// The save dialog sequence, for variants that raise one.
    pub save_dialog: Option<DialogMap>,
}

/// Signatures for a variant's save/export dialog sequence.
pub struct DialogMap {
    /// Window class of the dialog.
    pub class: &'static str,
    /// Substring the dialog title must contain.
    pub title_pattern: &'static str,
    /// The edit control that receives the destination path.
    pub file_name_edit: ControlQuery,
    /// The button that confirms the dialog.
    pub confirm: ControlQuery,
    /// Substring identifying the overwrite confirmation prompt, for variants
    /// that double-check before replacing an existing file.
    pub overwrite_prompt: &'static str,
    /// The button that accepts overwriting.
    pub overwrite_accept: ControlQuery,
}

// The first-generation editors share the common-dialog save sequence.
const FILE_DIALOG: DialogMap = DialogMap {
    class: "#32770",
    title_pattern: "Save",
    file_name_edit: ControlQuery::Item(1152),
    confirm: ControlQuery::Item(1),
    overwrite_prompt: "Confirm Save",
    overwrite_accept: ControlQuery::Item(6),
};

const STUDIO: ControlMap = ControlMap {
    title_pattern: "VoxTalk Studio",
    window_class: None,
    talk_text: ControlQuery::Class {
        name: "RICHEDIT50W",
        index: 0,
    },
    save_button: ControlQuery::Item(1002),
    save_dialog: None,
};

const EX: ControlMap = ControlMap {
    title_pattern: "VoxTalk+ EX",
    window_class: None,
    talk_text: ControlQuery::Class {
        name: "RichEdit20W",
        index: 0,
    },
    save_button: ControlQuery::Titled {
        class: "Button",
        title: "Save Audio",
    },
    save_dialog: Some(FILE_DIALOG),
};

const CLASSIC: ControlMap = ControlMap {
    title_pattern: "VoxTalk+",
    window_class: None,
    talk_text: ControlQuery::Class {
        name: "RichEdit20W",
        index: 0,
    },
    save_button: ControlQuery::Titled {
        class: "Button",
        title: "Save Audio",
    },
    save_dialog: Some(FILE_DIALOG),
};

impl Variant {
    /// Returns the window and control signatures for this variant.
    pub fn control_map(self) -> &'static ControlMap {
        match self {
            Self::Studio => &STUDIO,
            Self::Ex => &EX,
            Self::Classic => &CLASSIC,
        }
    }

    /// Matches a top-level window signature against the known variants.
    pub fn detect(title: &str, class_name: &str) -> Option<Variant> {
        Self::iter().find(|variant| {
            let map = variant.control_map();
            title.contains(map.title_pattern)
                && map.window_class.map_or(true, |class| class == class_name)
        })
    }

    /// The human-readable name of the variant.
    pub fn name(self) -> &'static str {
        self.into()
    }
}
