//! Avatar shop: buy with stars, then toggle equipment per slot.

use thiserror::Error;

use crate::domain::{ShopItem, Student};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShopError {
  #[error("unknown shop item: {0}")]
  UnknownItem(String),
  #[error("not enough stars: need {cost}, have {stars}")]
  InsufficientStars { cost: u32, stars: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopOutcome {
  Purchased,
  Equipped,
  Unequipped,
}

/// Owned items toggle in their slot; anything else is bought and equipped.
pub fn purchase_or_toggle(student: &mut Student, catalog: &[ShopItem], item_id: &str) -> Result<ShopOutcome, ShopError> {
  let item = catalog
    .iter()
    .find(|i| i.id == item_id)
    .ok_or_else(|| ShopError::UnknownItem(item_id.to_string()))?;

  if student.inventory.iter().any(|id| id == item_id) {
    let slot = student.equipped.slot_mut(item.slot);
    if slot.as_deref() == Some(item_id) {
      *slot = None;
      return Ok(ShopOutcome::Unequipped);
    }
    *slot = Some(item.id.clone());
    return Ok(ShopOutcome::Equipped);
  }

  if student.stars < item.cost {
    return Err(ShopError::InsufficientStars { cost: item.cost, stars: student.stars });
  }
  student.stars -= item.cost;
  student.inventory.push(item.id.clone());
  *student.equipped.slot_mut(item.slot) = Some(item.id.clone());
  Ok(ShopOutcome::Purchased)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ShopSlot;

  fn catalog() -> Vec<ShopItem> {
    vec![
      ShopItem { id: "hat_crown".into(), name: "Crown".into(), slot: ShopSlot::Hat, icon: "👑".into(), cost: 50 },
      ShopItem { id: "hat_cap".into(), name: "Cap".into(), slot: ShopSlot::Hat, icon: "🧢".into(), cost: 10 },
    ]
  }

  #[test]
  fn purchase_deducts_and_equips() {
    let mut s = Student::new("s", "X-1", "n");
    s.stars = 60;
    assert_eq!(purchase_or_toggle(&mut s, &catalog(), "hat_crown"), Ok(ShopOutcome::Purchased));
    assert_eq!(s.stars, 10);
    assert_eq!(s.equipped.hat.as_deref(), Some("hat_crown"));
  }

  #[test]
  fn owned_item_toggles_without_charge() {
    let mut s = Student::new("s", "X-1", "n");
    s.stars = 5;
    s.inventory = vec!["hat_crown".into(), "hat_cap".into()];
    assert_eq!(purchase_or_toggle(&mut s, &catalog(), "hat_cap"), Ok(ShopOutcome::Equipped));
    assert_eq!(purchase_or_toggle(&mut s, &catalog(), "hat_crown"), Ok(ShopOutcome::Equipped));
    assert_eq!(s.equipped.hat.as_deref(), Some("hat_crown"));
    assert_eq!(purchase_or_toggle(&mut s, &catalog(), "hat_crown"), Ok(ShopOutcome::Unequipped));
    assert_eq!(s.equipped.hat, None);
    assert_eq!(s.stars, 5);
  }

  #[test]
  fn rejects_unknown_and_unaffordable() {
    let mut s = Student::new("s", "X-1", "n");
    s.stars = 9;
    assert_eq!(
      purchase_or_toggle(&mut s, &catalog(), "hat_cap"),
      Err(ShopError::InsufficientStars { cost: 10, stars: 9 })
    );
    assert!(matches!(purchase_or_toggle(&mut s, &catalog(), "nope"), Err(ShopError::UnknownItem(_))));
    assert!(s.inventory.is_empty());
  }
}
