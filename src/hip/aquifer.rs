/// Locate the topmost aquifer / aquitard of a soil column.

use crate::layers;
use crate::model::{DkModel, HipError, TopLayer};

/// First layer, walking top to bottom, whose DK2019 name is an aquifer.
///
/// `names` are elevation-space layer names, e.g. from
/// [`SoilColumn::layer_names`](crate::model::SoilColumn::layer_names).
pub fn find_topmost_aquifer<'a>(
    model: DkModel,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<TopLayer, HipError> {
    find_first(model, names, |layer| layer.aquifer.is_some())?.ok_or(HipError::NoAquiferFound)
}

/// First layer, walking top to bottom, whose DK2019 name is an aquitard.
pub fn find_topmost_aquitard<'a>(
    model: DkModel,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<TopLayer, HipError> {
    find_first(model, names, |layer| layers::is_aquitard(layer.dk2019))?.ok_or(HipError::NoAquitardFound)
}

fn find_first<'a>(
    model: DkModel,
    names: impl IntoIterator<Item = &'a str>,
    matches: impl Fn(&TopLayer) -> bool,
) -> Result<Option<TopLayer>, HipError> {
    for name in names {
        let layer = layers::resolve(model, name)?;
        if matches(&layer) {
            return Ok(Some(layer));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_layer_is_skipped_when_not_an_aquifer() {
        let found = find_topmost_aquifer(DkModel::Dk1, ["CompLayer_1", "CompLayer_2", "CompLayer_3", "CompLayer_4"])
            .expect("CompLayer_3 is ks1");
        assert_eq!(found.elevation, "CompLayer_3");
        assert_eq!(found.head_elevation, 8);
        assert_eq!(found.dk2019, "ks1");
        assert_eq!(found.aquifer, Some("glw1"));
    }

    #[test]
    fn test_composite_layer_is_an_aquifer_in_dk5() {
        let found = find_topmost_aquifer(DkModel::Dk5, ["CompLayer_1", "CompLayer_2"]).expect("composite aquifer");
        assert_eq!(found.dk2019, "kl1/kl2 + ks1/ks2");
        assert_eq!(found.aquifer, Some("glw1"));
    }

    #[test]
    fn test_no_aquifer_is_an_error() {
        let err = find_topmost_aquifer(DkModel::Dk1, ["CompLayer_1", "CompLayer_2"]).unwrap_err();
        assert!(matches!(err, HipError::NoAquiferFound));
        assert_eq!(err.to_string(), "No aquifer in soil column");
    }

    #[test]
    fn test_topmost_aquitard() {
        let found = find_topmost_aquitard(DkModel::Dk3, ["CompLayer_1", "CompLayer_3", "CompLayer_4"])
            .expect("CompLayer_4 is kl2");
        assert_eq!(found.dk2019, "kl2");
        assert_eq!(found.aquifer, None);

        let err = find_topmost_aquitard(DkModel::Dk7, ["CompLayer_1", "CompLayer_2"]).unwrap_err();
        assert!(matches!(err, HipError::NoAquitardFound));
    }

    #[test]
    fn test_unknown_layer_name_fails() {
        let err = find_topmost_aquifer(DkModel::Dk7, ["CompLayer_9"]).unwrap_err();
        assert!(matches!(err, HipError::UnknownLayer { .. }));
    }
}
