//! Prefecture reference data: names, approximate centroids for
//! prefecture-level placeholder records, and the curated map-URL table.

/// All 47 prefectures, used to validate adapter output.
pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県",
    "茨城県", "栃木県", "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県",
    "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県",
    "岐阜県", "静岡県", "愛知県", "三重県",
    "滋賀県", "京都府", "大阪府", "兵庫県", "奈良県", "和歌山県",
    "鳥取県", "島根県", "岡山県", "広島県", "山口県",
    "徳島県", "香川県", "愛媛県", "高知県",
    "福岡県", "佐賀県", "長崎県", "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

/// Approximate prefecture centroids (prefectural office coordinates),
/// used when a source only yields a prefecture-level link and no precise
/// sighting location. Prefectures without bear populations are absent.
const PREFECTURE_COORDS: [(&str, &str, &str); 36] = [
    ("北海道", "43.064", "141.347"),
    ("青森県", "40.824", "140.740"),
    ("岩手県", "39.703", "141.153"),
    ("宮城県", "38.269", "140.872"),
    ("秋田県", "39.719", "140.103"),
    ("山形県", "38.240", "140.363"),
    ("福島県", "37.750", "140.467"),
    ("茨城県", "36.341", "140.447"),
    ("栃木県", "36.566", "139.883"),
    ("群馬県", "36.391", "139.060"),
    ("埼玉県", "35.857", "139.649"),
    ("東京都", "35.689", "139.692"),
    ("神奈川県", "35.448", "139.643"),
    ("新潟県", "37.902", "139.023"),
    ("富山県", "36.696", "137.211"),
    ("石川県", "36.595", "136.626"),
    ("福井県", "36.065", "136.222"),
    ("山梨県", "35.664", "138.568"),
    ("長野県", "36.651", "138.181"),
    ("岐阜県", "35.391", "136.722"),
    ("静岡県", "34.977", "138.383"),
    ("愛知県", "35.180", "136.907"),
    ("三重県", "34.730", "136.509"),
    ("滋賀県", "35.004", "135.869"),
    ("京都府", "35.021", "135.756"),
    ("大阪府", "34.686", "135.520"),
    ("兵庫県", "34.691", "135.183"),
    ("奈良県", "34.685", "135.833"),
    ("和歌山県", "34.226", "135.167"),
    ("鳥取県", "35.504", "134.238"),
    ("島根県", "35.472", "133.051"),
    ("岡山県", "34.662", "133.935"),
    ("広島県", "34.397", "132.460"),
    ("山口県", "34.186", "131.471"),
    ("徳島県", "34.066", "134.559"),
    ("高知県", "33.560", "133.531"),
];

/// Manually verified official sighting-map URLs per prefecture. These
/// beat whatever the news-links heuristic scraped.
const PREFECTURE_MAP_URLS: [(&str, &str); 17] = [
    ("北海道", "https://higumap.info/recent"),
    ("秋田県", "https://kumadas.net/"),
    ("岩手県", "https://www.google.com/maps/d/viewer?mid=1Rzj7qui6pXmL02XzmsH_Zqf8Feg&hl=ja"),
    ("宮城県", "https://www.google.com/maps/d/u/0/viewer?mid=1aZCXqs7vrAPEBhE4HkT3CwmlMdunP2Y"),
    ("山形県", "https://www.google.com/maps/d/viewer?mid=1N9E9rixBQwxB4TKQ2XsP32GLOi6w6qQ"),
    ("福島県", "https://www.google.com/maps/d/viewer?mid=10gR9gJgiEA_Tso2E0jM-Q2sI41A3n_w"),
    ("群馬県", "https://pref-gunma.maps.arcgis.com/apps/dashboards/5276d2ebf02a42da8595ed2a51a334c8"),
    ("埼玉県", "https://www.arcgis.com/apps/dashboards/6851a59c5a76496e9c9e3b54b2e67ff9"),
    ("新潟県", "https://www.arcgis.com/apps/dashboards/20b4d06fb3b34776959a4e69c7a8511a"),
    ("富山県", "https://www.google.com/maps/d/viewer?mid=1chPdwv1B9w0z0VhRWqg6xV2mssU"),
    ("福井県", "https://tsukinowaguma.pref.fukui.lg.jp/KUMA/Top.aspx"),
    ("山梨県", "https://www.pref.yamanashi.jp/shizen/kuma2.html"),
    ("岐阜県", "https://gis-gifu.jp/gifu/Map?mid=10538"),
    ("三重県", "https://map-pref-mie.maps.arcgis.com/apps/webappviewer/index.html?id=67a611717c1a4cc487540b2be4264c45"),
    ("京都府", "https://g-kyoto.gis.pref.kyoto.lg.jp/g-kyoto/PositionSelect?mid=676&mtp=pfm"),
    ("鳥取県", "https://www.google.com/maps/d/viewer?mid=1_E0bAOGdgHB2ttDsLaDSWem6AJvNObM"),
    ("山口県", "https://yamaguchi-opendata.jp/dashboard?org=35000&res=0305d966-f716-43fa-a4cf-78b0ed2c65a1"),
];

pub fn is_known_prefecture(name: &str) -> bool {
    PREFECTURES.contains(&name)
}

/// Centroid coordinates for a prefecture, decimal-as-string.
pub fn prefecture_centroid(name: &str) -> Option<(&'static str, &'static str)> {
    PREFECTURE_COORDS
        .iter()
        .find(|(p, _, _)| *p == name)
        .map(|(_, lat, lng)| (*lat, *lng))
}

/// Curated override URL for a prefecture's official sighting map.
pub fn curated_map_url(name: &str) -> Option<&'static str> {
    PREFECTURE_MAP_URLS
        .iter()
        .find(|(p, _)| *p == name)
        .map(|(_, url)| *url)
}
