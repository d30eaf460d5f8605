use image::RgbaImage;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Frame pixels are repainted from scratch every frame, so snapshots only
// keep the dimensions and restore to a blank image of the same size.
pub(crate) fn rgba_ser<S: Serializer>(img: &RgbaImage, serializer: S) -> Result<S::Ok, S::Error> {
  (img.width(), img.height()).serialize(serializer)
}

pub(crate) fn rgba_deser<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<RgbaImage, D::Error> {
  let (width, height) = <(u32, u32)>::deserialize(deserializer)?;
  Ok(RgbaImage::new(width, height))
}

#[cfg(test)]
mod test {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Serialize, Deserialize)]
  struct Holder {
    #[serde(serialize_with = "rgba_ser", deserialize_with = "rgba_deser")]
    image: RgbaImage,
  }

  #[test]
  fn image_round_trips_dimensions_only() {
    let mut holder = Holder {
      image: RgbaImage::new(256, 240),
    };
    holder.image.put_pixel(3, 7, image::Rgba([1, 2, 3, 4]));

    let mut buffer = Vec::new();
    ciborium::ser::into_writer(&holder, &mut buffer).unwrap();
    let restored: Holder = ciborium::de::from_reader(buffer.as_slice()).unwrap();

    assert_eq!(restored.image.width(), 256);
    assert_eq!(restored.image.height(), 240);
    assert_eq!(*restored.image.get_pixel(3, 7), image::Rgba([0, 0, 0, 0]));
  }
}
