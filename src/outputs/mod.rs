//! Output generation.
//!
//! - [`rss`]: renders the merged items as an RSS 2.0 document and writes it
//!   to the configured path
//!
//! # Output Structure
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <rss version="2.0">
//!   <channel>
//!     <title/> <link/> <description/> [<language/>] [<ttl/>]
//!     <lastBuildDate/> <generator/>
//!     <item>
//!       <title/> <link/> <guid/> [<description/>] [<pubDate/>] <source url=""/>
//!     </item>
//!   </channel>
//! </rss>
//! ```

pub mod rss;
