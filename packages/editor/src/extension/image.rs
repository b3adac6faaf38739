use super::{unexpected, Extension, ExtensionContext};
use folio_convert::ast::{stringify, text_inlines};
use folio_convert::{Attr, ConversionRules, Inline, Target};
use folio_model::{attrs, AttrSpec, NodeSpec};

pub const IMAGE: &str = "image";

pub struct Image;

pub fn extension(_ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(Image))
}

impl Extension for Image {
    fn name(&self) -> &str {
        "image"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new(IMAGE, "")
            .group("inline")
            .inline()
            .attr("src", AttrSpec::required())
            .attr("alt", AttrSpec::with_default(""))
            .attr("title", AttrSpec::with_default(""))]
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_inline("Image", |r, i| match i {
                Inline::Image(_, alt, Target(src, title)) => {
                    let mut a = attrs([("src", src.as_str()), ("title", title.as_str())]);
                    a.insert("alt".into(), stringify(alt).into());
                    Ok(vec![r.atom(IMAGE, a)?])
                }
                other => Err(unexpected(other.kind())),
            })
            .write_inline(IMAGE, |_, n| {
                let src = n.attr_str("src").unwrap_or_default().to_string();
                let title = n.attr_str("title").unwrap_or_default().to_string();
                let alt = text_inlines(n.attr_str("alt").unwrap_or_default());
                Ok(vec![Inline::Image(Attr::default(), alt, Target(src, title))])
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{machine, markdown};

    #[test]
    fn test_image_is_an_atom() {
        let m = machine("Look ![a cat](cat.png \"Cat\") here");
        let para = m.state().doc().child(0).unwrap().child(0).unwrap().clone();
        let image = para.child(1).unwrap();
        assert_eq!(image.node_type(), IMAGE);
        assert_eq!(image.attr_str("alt"), Some("a cat"));
        assert_eq!(image.node_size(), 1);
        assert!(markdown(m.state()).starts_with("Look ![a cat](cat.png \"Cat\") here"));
    }
}
